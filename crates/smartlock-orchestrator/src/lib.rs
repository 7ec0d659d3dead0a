//! Edge orchestrator for the smart lock.
//!
//! Turns the microcontroller's serial stream into capture episodes, runs
//! face recognition on live frames and arbitrates unlock commands from the
//! recognition and remote producers.
//!
//! # Architecture
//!
//! ```text
//! serial reader (blocking) -> session loop -> CapturePipeline -> camera (blocking)
//!                                                   |
//!                                               FrameSlot (1, drop-oldest)
//!                                                   |
//!                                           RecognitionWorker -> UnlockArbiter
//! remote channel -> RemoteHandler ------------------------------------^
//! ```
//!
//! - [`OrchestratorContext`] - Shared collaborators and settings
//! - [`Orchestrator::start`] - Spawns the task set, returns an [`OrchestratorHandle`]
//! - [`UnlockArbiter`] - Sends the unlock command, then writes the access log
//! - [`Enroller`] - Adds embeddings and reloads the [`KnownFaceCache`]
//! - [`RemoteHandler`] - Single dispatch for [`RemoteCommand`]s
//!
//! # Examples
//!
//! ```no_run
//! use smartlock_hardware::mock::{MockCamera, MockRecognizer, MockSerialLink};
//! use smartlock_orchestrator::{
//!     FfmpegMerger, Orchestrator, OrchestratorContext, PipelineSettings, RemoteCommand,
//! };
//! use smartlock_storage::{Database, SqliteGateway};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::in_memory().await?;
//! let (reader, writer, _serial) = MockSerialLink::new();
//! let (camera, _camera) = MockCamera::new();
//! let (recognizer, _faces) = MockRecognizer::new();
//!
//! let ctx = OrchestratorContext::new(
//!     Arc::new(writer),
//!     Arc::new(recognizer),
//!     Arc::new(FfmpegMerger::default()),
//!     Arc::new(SqliteGateway::new(db.pool().clone())),
//!     PipelineSettings::default(),
//! );
//! let handle = Orchestrator::start(ctx, Box::new(reader), Box::new(camera)).await?;
//!
//! handle.remote_handler().handle(RemoteCommand::Unlock(true)).await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod capture;
pub mod context;
pub mod enrollment;
pub mod episode;
pub mod error;
pub mod frame_slot;
pub mod known_faces;
pub mod merge;
pub mod recognition;
pub mod remote;
pub mod service;
pub mod settings;

pub use arbiter::{GrantOutcome, UnlockArbiter};
pub use capture::CapturePipeline;
pub use context::OrchestratorContext;
pub use enrollment::Enroller;
pub use episode::Episode;
pub use error::{OrchestratorError, Result};
pub use frame_slot::FrameSlot;
pub use known_faces::{KnownFace, KnownFaceCache, KnownFaceSet};
pub use merge::{ArtifactMerger, FfmpegMerger};
pub use recognition::{RecognitionWorker, TaggedFrame};
pub use remote::{RemoteCommand, RemoteHandler, RemoteReply};
pub use service::{Orchestrator, OrchestratorHandle};
pub use settings::PipelineSettings;
