use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use smartlock_core::FaceEncoding;

/// A person who may be recognized at the door.
///
/// Names are unique. An identity without embeddings is inert: it can never
/// produce a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// An identity together with every embedding enrolled for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledIdentity {
    pub id: i64,
    pub name: String,
    pub encodings: Vec<FaceEncoding>,
}

/// Outcome of one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentRecord {
    pub identity_id: i64,
    pub embedding_id: i64,
    /// `true` if the identity did not exist before this enrollment.
    pub identity_created: bool,
}
