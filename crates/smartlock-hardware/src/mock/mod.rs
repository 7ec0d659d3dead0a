//! Mock device implementations for testing and simulated runs.
//!
//! Each mock is created together with a handle that scripts its behaviour
//! and exposes what it was asked to do.

pub mod camera;
pub mod recognizer;
pub mod serial;

pub use camera::{MockCamera, MockCameraHandle};
pub use recognizer::{MockRecognizer, MockRecognizerHandle};
pub use serial::{MockSerialHandle, MockSerialLink, MockSerialReader, MockSerialWriter};
