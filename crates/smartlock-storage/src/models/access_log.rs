use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use smartlock_core::AccessMethod;

/// One unlock decision.
///
/// Created exactly once per grant and never updated or deleted.
/// `accessed_at` is set by the database at insert time (local time).
///
/// # Examples
///
/// ```
/// use smartlock_storage::models::AccessLogEntry;
/// use smartlock_core::AccessMethod;
/// use chrono::NaiveDate;
///
/// let entry = AccessLogEntry {
///     id: 1,
///     accessed_at: NaiveDate::from_ymd_opt(2025, 1, 27)
///         .unwrap()
///         .and_hms_opt(14, 30, 0)
///         .unwrap(),
///     method: AccessMethod::Face,
///     identity_id: Some(7),
///     artifact_path: Some("videos/20250127_143000.mp4".to_string()),
/// };
///
/// assert!(entry.is_identified());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub accessed_at: NaiveDateTime,
    pub method: AccessMethod,
    pub identity_id: Option<i64>,
    pub artifact_path: Option<String>,
}

impl AccessLogEntry {
    /// Whether the entry references an enrolled identity.
    pub fn is_identified(&self) -> bool {
        self.identity_id.is_some()
    }
}

/// An unlock grant waiting to be logged.
///
/// Face grants carry the recognized name; the identity id is resolved inside
/// the logging transaction so a concurrently renamed or missing identity
/// still produces a log entry, just without the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub method: AccessMethod,
    pub identity_name: Option<String>,
    pub artifact_path: Option<String>,
}

impl AccessGrant {
    pub fn face(identity_name: impl Into<String>, artifact_path: impl Into<String>) -> Self {
        Self {
            method: AccessMethod::Face,
            identity_name: Some(identity_name.into()),
            artifact_path: Some(artifact_path.into()),
        }
    }

    pub fn remote() -> Self {
        Self {
            method: AccessMethod::Remote,
            identity_name: None,
            artifact_path: None,
        }
    }
}

/// Per-day unlock counts shown by the remote UI.
///
/// Serialized with the UI's field names: remote unlocks are `web_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAccessCount {
    pub date: NaiveDate,
    pub face_count: i64,
    #[serde(rename = "web_count")]
    pub remote_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_constructors() {
        let face = AccessGrant::face("alice", "videos/20250101_000000.mp4");
        assert_eq!(face.method, AccessMethod::Face);
        assert_eq!(face.identity_name.as_deref(), Some("alice"));

        let remote = AccessGrant::remote();
        assert_eq!(remote.method, AccessMethod::Remote);
        assert!(remote.identity_name.is_none());
        assert!(remote.artifact_path.is_none());
    }

    #[test]
    fn test_daily_count_wire_names() {
        let count = DailyAccessCount {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            face_count: 1,
            remote_count: 2,
        };
        let json = serde_json::to_value(count).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"date": "2025-01-01", "face_count": 1, "web_count": 2})
        );
    }
}
