pub mod access_log;
pub mod identity;

pub use access_log::{AccessGrant, AccessLogEntry, DailyAccessCount};
pub use identity::{EnrolledIdentity, EnrollmentRecord, Identity};
