//! TCP server for the remote control channel.
//!
//! # Architecture
//!
//! ```text
//! Phone app ┐
//!           ├──> RemoteServer ──> LinesCodec (JSON per line) ──> RemoteHandler
//! Web panel ┘
//! ```
//!
//! Each connection runs in its own task. Commands from different clients
//! are handled concurrently; commands on one connection are answered in
//! order.
//!
//! # Example Usage
//!
//! ```no_run
//! use smartlock_orchestrator::RemoteHandler;
//! use smartlock_remote::{RemoteServer, RemoteServerConfig};
//! use smartlock_storage::SqliteGateway;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(handler: RemoteHandler<SqliteGateway>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RemoteServerConfig {
//!     bind_addr: "0.0.0.0:3000".parse()?,
//!     max_connections: 16,
//! };
//!
//! let server = RemoteServer::bind(config, handler).await?;
//! server.serve(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{RemoteError, Result};
use futures::{SinkExt, StreamExt};
use smartlock_core::config::RemoteConfig;
use smartlock_orchestrator::{RemoteCommand, RemoteHandler};
use smartlock_storage::PersistenceGateway;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_util::{
    codec::{Framed, LinesCodec},
    sync::CancellationToken,
};
use tracing::{debug, error, info, warn};

/// Longest accepted command line in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Configuration for the remote control server
///
/// # Example
///
/// ```
/// use smartlock_remote::RemoteServerConfig;
///
/// let config = RemoteServerConfig {
///     bind_addr: "127.0.0.1:3000".parse().unwrap(),
///     max_connections: 4,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RemoteServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Maximum number of simultaneous connections
    pub max_connections: usize,
}

impl Default for RemoteServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000)),
            max_connections: 16,
        }
    }
}

impl TryFrom<&RemoteConfig> for RemoteServerConfig {
    type Error = RemoteError;

    fn try_from(config: &RemoteConfig) -> Result<Self> {
        let bind_addr = config
            .bind_addr
            .parse()
            .map_err(|_| RemoteError::InvalidAddress(config.bind_addr.clone()))?;
        Ok(Self {
            bind_addr,
            ..Self::default()
        })
    }
}

/// Remote control server
///
/// Accepts connections until the cancellation token fires, then closes
/// every open connection.
pub struct RemoteServer<G> {
    listener: TcpListener,
    handler: RemoteHandler<G>,
    config: RemoteServerConfig,
}

impl<G: PersistenceGateway + 'static> RemoteServer<G> {
    /// Bind the server to the configured address
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::BindFailed`] if the address is in use or not
    /// permitted.
    pub async fn bind(config: RemoteServerConfig, handler: RemoteHandler<G>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|_| RemoteError::BindFailed(config.bind_addr))?;

        info!(
            addr = %config.bind_addr,
            max_connections = config.max_connections,
            "Remote server listening"
        );

        Ok(Self {
            listener,
            handler,
            config,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let mut connections = JoinSet::new();

        loop {
            let (stream, addr) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            while connections.try_join_next().is_some() {}

            // Reject this connection but keep accepting others
            if connections.len() >= self.config.max_connections {
                error!(
                    addr = %addr,
                    max_connections = self.config.max_connections,
                    "Connection rejected: maximum connections reached"
                );
                drop(stream);
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
            }

            let handler = self.handler.clone();
            let cancel = cancel.clone();
            connections.spawn(async move {
                if let Err(e) = serve_connection(stream, addr, handler, cancel).await {
                    warn!(addr = %addr, error = %e, "Connection closed with error");
                }
            });
        }

        connections.shutdown().await;
        info!("Remote server stopped");
        Ok(())
    }
}

async fn serve_connection<G: PersistenceGateway + 'static>(
    stream: TcpStream,
    addr: SocketAddr,
    handler: RemoteHandler<G>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(addr = %addr, "Remote client connected");
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = framed.next() => line,
        };
        let Some(line) = line else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = respond(&handler, &line).await?;
        framed.send(reply).await?;
    }

    info!(addr = %addr, "Remote client disconnected");
    Ok(())
}

/// Parse one command line, dispatch it and encode the reply line.
///
/// Malformed commands and handler failures produce an
/// `{"event":"error","data":..}` reply instead of closing the connection.
pub async fn respond<G: PersistenceGateway + 'static>(
    handler: &RemoteHandler<G>,
    line: &str,
) -> Result<String> {
    let command: RemoteCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Rejected remote command");
            return Ok(error_reply(&e.to_string()));
        }
    };
    debug!(?command, "Dispatching remote command");

    match handler.handle(command).await {
        Ok(reply) => Ok(serde_json::to_string(&reply)?),
        Err(e) => {
            warn!(?command, error = %e, "Remote command failed");
            Ok(error_reply(&e.to_string()))
        }
    }
}

fn error_reply(message: &str) -> String {
    serde_json::json!({ "event": "error", "data": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_remote_settings() {
        let settings = RemoteConfig {
            bind_addr: "127.0.0.1:4000".into(),
        };
        let config = RemoteServerConfig::try_from(&settings).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.max_connections, 16);

        let bad = RemoteConfig {
            bind_addr: "not-an-address".into(),
        };
        assert!(matches!(
            RemoteServerConfig::try_from(&bad),
            Err(RemoteError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_error_reply_shape() {
        let value: serde_json::Value = serde_json::from_str(&error_reply("boom")).unwrap();
        assert_eq!(value, serde_json::json!({"event": "error", "data": "boom"}));
    }
}
