//! Outbound commands sent to the lock microcontroller.

use smartlock_core::constants::{CMD_AUDIO_START, CMD_AUDIO_STOP, CMD_LOCK, CMD_UNLOCK};
use std::fmt;

/// Commands the edge device writes to the serial link.
///
/// The firmware matches on the literal byte strings, so `as_bytes` is the
/// whole wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockCommand {
    /// Release the lock (`unlock`).
    Unlock,
    /// Engage the lock (`lock`).
    Lock,
    /// Start streaming audio (`Audio START\n`).
    AudioStart,
    /// Stop streaming audio (`Audio STOP\n`).
    AudioStop,
}

impl LockCommand {
    /// `Unlock` for `true`, `Lock` for `false`.
    #[must_use]
    pub fn from_unlock(unlock: bool) -> Self {
        if unlock { Self::Unlock } else { Self::Lock }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Unlock => CMD_UNLOCK,
            Self::Lock => CMD_LOCK,
            Self::AudioStart => CMD_AUDIO_START,
            Self::AudioStop => CMD_AUDIO_STOP,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::Lock => "lock",
            Self::AudioStart => "audio_start",
            Self::AudioStop => "audio_stop",
        }
    }
}

impl fmt::Display for LockCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LockCommand::Unlock, b"unlock".as_slice())]
    #[case(LockCommand::Lock, b"lock".as_slice())]
    #[case(LockCommand::AudioStart, b"Audio START\n".as_slice())]
    #[case(LockCommand::AudioStop, b"Audio STOP\n".as_slice())]
    fn test_wire_bytes(#[case] command: LockCommand, #[case] expected: &[u8]) {
        assert_eq!(command.as_bytes(), expected);
    }

    #[test]
    fn test_from_unlock() {
        assert_eq!(LockCommand::from_unlock(true), LockCommand::Unlock);
        assert_eq!(LockCommand::from_unlock(false), LockCommand::Lock);
    }
}
