// ndef-poller/ndef/src/error.rs

//! Error types shared by every operation of the crate.

use thiserror::Error;

use crate::types::{NdefState, TagType};

/// Errors reported by the radio abstraction underneath the pollers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransceiveError {
    /// No answer within the frame waiting time.
    #[error("tag did not answer within the frame waiting time")]
    Timeout,

    /// Response failed the CRC check.
    #[error("response failed CRC check")]
    Crc,

    /// Malformed frame in the tag response.
    #[error("framing error in tag response")]
    Framing,

    /// Tag answered with its technology's error flags.
    #[error("tag answered with error flags {0:#04x}")]
    Status(u8),

    /// The transceiver implementation does not offer this command.
    #[error("command not provided by this transceiver")]
    Unsupported,

    /// Anything else the radio stack wants to surface.
    #[error("transceive failed: {0}")]
    Other(String),
}

/// Common error type for all NDEF operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied value is out of range or mismatched.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The session state forbids this operation.
    #[error("operation not permitted in state {state:?}")]
    WrongState {
        /// State the session was in when the operation was refused.
        state: NdefState,
    },

    /// No driver is compiled in for the tag's technology.
    #[error("no driver available for {0:?}")]
    NotSupported(TagType),

    /// The tag answered with malformed or inconsistent data.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The message does not fit the tag's storage area.
    #[error("message of {needed} bytes does not fit in {available} available bytes")]
    OutOfMemory {
        /// Bytes the message needs, header overhead included.
        needed: usize,
        /// Bytes the tag actually has left.
        available: usize,
    },

    /// The tag answered but does not present a valid NDEF structure.
    #[error("tag refused the request or carries no valid NDEF data: {0}")]
    Request(String),

    /// A Type 4 tag closed an exchange with something other than 9000h.
    #[error("unexpected status word: sw1={sw1:#04x} sw2={sw2:#04x}")]
    StatusWord {
        /// First status byte.
        sw1: u8,
        /// Second status byte.
        sw2: u8,
    },

    /// Transport failure passed through from the radio layer.
    #[error("transceive error: {0}")]
    Transceive(#[from] TransceiveError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_display() {
        let err = Error::OutOfMemory {
            needed: 70,
            available: 62,
        };
        let s = format!("{}", err);
        assert!(s.contains("70 bytes"));
        assert!(s.contains("62 available"));
    }

    #[test]
    fn wrong_state_display() {
        let err = Error::WrongState {
            state: NdefState::Invalid,
        };
        assert!(format!("{}", err).contains("Invalid"));
    }

    #[test]
    fn status_word_display() {
        let err = Error::StatusWord {
            sw1: 0x6A,
            sw2: 0x82,
        };
        let s = format!("{}", err);
        assert!(s.contains("0x6a"));
        assert!(s.contains("0x82"));
    }

    #[test]
    fn transceive_conversion() {
        let err: Error = TransceiveError::Timeout.into();
        assert!(matches!(err, Error::Transceive(TransceiveError::Timeout)));
        assert!(format!("{}", err).contains("frame waiting time"));
    }
}
