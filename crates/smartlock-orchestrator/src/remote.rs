//! Remote control commands and their single dispatch point.

use crate::{arbiter::UnlockArbiter, error::Result};
use serde::{Deserialize, Serialize};
use smartlock_storage::{AccessGrant, DailyAccessCount, PersistenceGateway};
use std::sync::Arc;
use tracing::debug;

/// Commands accepted from the remote channel.
///
/// Serialized as `{"event": "unlock", "data": true}` and `{"event": "refresh"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RemoteCommand {
    /// `true` unlocks and logs a remote grant, `false` engages the lock.
    Unlock(bool),
    /// Ask for the daily access counts.
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RemoteReply {
    Unlocked,
    Locked,
    AccessLogs(Vec<DailyAccessCount>),
}

pub struct RemoteHandler<G> {
    arbiter: UnlockArbiter<G>,
    gateway: Arc<G>,
    refresh_days: u32,
}

impl<G> Clone for RemoteHandler<G> {
    fn clone(&self) -> Self {
        Self {
            arbiter: self.arbiter.clone(),
            gateway: Arc::clone(&self.gateway),
            refresh_days: self.refresh_days,
        }
    }
}

impl<G: PersistenceGateway + 'static> RemoteHandler<G> {
    pub fn new(arbiter: UnlockArbiter<G>, gateway: Arc<G>, refresh_days: u32) -> Self {
        Self {
            arbiter,
            gateway,
            refresh_days,
        }
    }

    pub async fn handle(&self, command: RemoteCommand) -> Result<RemoteReply> {
        debug!(?command, "Remote command");
        match command {
            RemoteCommand::Unlock(true) => {
                self.arbiter.grant(AccessGrant::remote()).await;
                Ok(RemoteReply::Unlocked)
            }
            RemoteCommand::Unlock(false) => {
                self.arbiter.lock().await;
                Ok(RemoteReply::Locked)
            }
            RemoteCommand::Refresh => {
                let counts = self.gateway.daily_access_counts(self.refresh_days).await?;
                Ok(RemoteReply::AccessLogs(counts))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"event":"unlock","data":true}"#, RemoteCommand::Unlock(true))]
    #[case(r#"{"event":"unlock","data":false}"#, RemoteCommand::Unlock(false))]
    #[case(r#"{"event":"refresh"}"#, RemoteCommand::Refresh)]
    fn test_command_wire_shape(#[case] json: &str, #[case] expected: RemoteCommand) {
        let parsed: RemoteCommand = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case(r#"{"event":"open_door"}"#)]
    #[case(r#"{"event":"unlock","data":"yes"}"#)]
    #[case(r#"{"data":true}"#)]
    fn test_rejects_unknown_commands(#[case] json: &str) {
        assert!(serde_json::from_str::<RemoteCommand>(json).is_err());
    }

    #[test]
    fn test_reply_wire_shape() {
        assert_eq!(
            serde_json::to_string(&RemoteReply::Unlocked).unwrap(),
            r#"{"event":"unlocked"}"#
        );
        let reply = RemoteReply::AccessLogs(vec![DailyAccessCount {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            face_count: 1,
            remote_count: 2,
        }]);
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"event":"access_logs","data":[{"date":"2025-01-01","face_count":1,"web_count":2}]}"#
        );
    }
}
