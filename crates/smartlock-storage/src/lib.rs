//! Persistence for the smart lock edge device.
//!
//! This crate provides the SQLite-backed Persistence Gateway used by the
//! orchestrator: enrolled identities and their face embeddings, and the
//! append-only access log.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager; creates missing tables on connect
//! - [`PersistenceGateway`] - Storage contract the orchestrator depends on
//! - [`SqliteGateway`] - SQLite implementation of the gateway
//! - [`transaction`] - Transaction-aware statements for atomic multistep writes
//!
//! There is no migration framework. The schema is a fixed set of
//! `CREATE TABLE IF NOT EXISTS` statements.
//!
//! # Examples
//!
//! ```no_run
//! use smartlock_storage::{Database, DatabaseConfig, PersistenceGateway, SqliteGateway};
//! use smartlock_storage::models::AccessGrant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("smart_lock.db")).await?;
//! let gateway = SqliteGateway::new(db.pool().clone());
//!
//! gateway.record_access(&AccessGrant::remote()).await?;
//!
//! for day in gateway.daily_access_counts(7).await? {
//!     println!("{}: {} face, {} remote", day.date, day.face_count, day.remote_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod gateway;
pub mod models;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use gateway::{PersistenceGateway, SqliteGateway};
pub use models::{
    AccessGrant, AccessLogEntry, DailyAccessCount, EnrolledIdentity, EnrollmentRecord, Identity,
};
