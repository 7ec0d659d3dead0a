pub mod audio;
pub mod command;
pub mod decoder;

pub use audio::{encode_wav_f32, normalize_samples};
pub use command::LockCommand;
pub use decoder::{DecodedEvent, DecoderState, DrainEvents, ProtocolDecoder};
