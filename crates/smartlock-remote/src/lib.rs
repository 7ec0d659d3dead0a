//! Remote control channel for the smart lock.
//!
//! A TCP listener speaking newline-delimited JSON. Each line is one
//! [`RemoteCommand`]; each command gets exactly one reply line.
//!
//! ```text
//! -> {"event":"unlock","data":true}
//! <- {"event":"unlocked"}
//! -> {"event":"refresh"}
//! <- {"event":"access_logs","data":[{"date":"2025-01-01","face_count":1,"web_count":2}]}
//! -> {"event":"open_sesame"}
//! <- {"event":"error","data":"unknown variant `open_sesame`, ..."}
//! ```
//!
//! The server is a thin adapter: every command is dispatched to the
//! orchestrator's [`RemoteHandler`]. There is no authentication or TLS;
//! the channel is expected to sit behind the device's local network
//! boundary.
//!
//! [`RemoteCommand`]: smartlock_orchestrator::RemoteCommand
//! [`RemoteHandler`]: smartlock_orchestrator::RemoteHandler

pub mod error;
pub mod server;

pub use error::{RemoteError, Result};
pub use server::{RemoteServer, RemoteServerConfig};
