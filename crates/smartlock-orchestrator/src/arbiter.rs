//! Unlock arbitration and access logging.
//!
//! Every grant sends the unlock command first and writes the access log
//! second. A failed write is logged and never rescinds the unlock.

use crate::error::Result;
use smartlock_hardware::CommandSink;
use smartlock_protocol::LockCommand;
use smartlock_storage::{AccessGrant, PersistenceGateway};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to one grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    /// The unlock command reached the serial writer.
    pub command_sent: bool,
    /// Id of the access log entry, if it was written.
    pub log_id: Option<i64>,
}

/// Issues lock commands on behalf of the recognition and remote producers.
pub struct UnlockArbiter<G> {
    sink: Arc<dyn CommandSink>,
    gateway: Arc<G>,
}

impl<G> Clone for UnlockArbiter<G> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G: PersistenceGateway + 'static> UnlockArbiter<G> {
    pub fn new(sink: Arc<dyn CommandSink>, gateway: Arc<G>) -> Self {
        Self { sink, gateway }
    }

    /// Unlock, then record the grant.
    pub async fn grant(&self, grant: AccessGrant) -> GrantOutcome {
        let command_sent = match send_command(&self.sink, LockCommand::Unlock).await {
            Ok(()) => true,
            Err(e) => {
                warn!(method = %grant.method, error = %e, "Unlock command failed");
                false
            }
        };

        let log_id = match self.gateway.record_access(&grant).await {
            Ok(id) => {
                info!(
                    method = %grant.method,
                    identity = grant.identity_name.as_deref().unwrap_or("-"),
                    log_id = id,
                    "Access granted"
                );
                Some(id)
            }
            Err(e) => {
                error!(method = %grant.method, error = %e, "Failed to write access log");
                None
            }
        };

        GrantOutcome {
            command_sent,
            log_id,
        }
    }

    /// Engage the lock. Writes no access log.
    pub async fn lock(&self) -> bool {
        match send_command(&self.sink, LockCommand::Lock).await {
            Ok(()) => {
                info!("Lock engaged");
                true
            }
            Err(e) => {
                warn!(error = %e, "Lock command failed");
                false
            }
        }
    }
}

/// Write one command from the blocking pool.
pub(crate) async fn send_command(sink: &Arc<dyn CommandSink>, command: LockCommand) -> Result<()> {
    let sink = Arc::clone(sink);
    tokio::task::spawn_blocking(move || sink.send(command)).await??;
    Ok(())
}
