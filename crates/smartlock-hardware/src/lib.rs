//! Hardware seams for the smart lock edge device.
//!
//! The orchestrator talks to three collaborators through the traits in
//! [`traits`]:
//!
//! - the lock microcontroller over a serial link ([`SerialReader`] for the
//!   inbound stream, [`CommandSink`] for outbound commands),
//! - the camera ([`Camera`]),
//! - the face recognition capability ([`FaceRecognizer`]).
//!
//! [`serial::open`] provides the real serial link on top of the
//! `serialport` crate. Controllable mocks for all three live in [`mock`]
//! and back both the test suites and the daemon's simulated mode.
//!
//! ```no_run
//! use smartlock_hardware::traits::{CommandSink, SerialReader};
//! use smartlock_protocol::LockCommand;
//! use std::time::Duration;
//!
//! fn main() -> smartlock_hardware::Result<()> {
//!     let (mut reader, writer) =
//!         smartlock_hardware::serial::open("/dev/ttyACM0", 230_400, Duration::from_millis(100))?;
//!
//!     writer.send(LockCommand::Unlock)?;
//!
//!     let mut buf = [0u8; 1024];
//!     let n = reader.read_chunk(&mut buf)?;
//!     println!("read {n} bytes");
//!     Ok(())
//! }
//! ```
//!
//! [`SerialReader`]: traits::SerialReader
//! [`CommandSink`]: traits::CommandSink
//! [`Camera`]: traits::Camera
//! [`FaceRecognizer`]: traits::FaceRecognizer

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{Camera, CommandSink, FaceRecognizer, SerialReader};
pub use types::{FaceComparison, FaceLocation, Frame};
