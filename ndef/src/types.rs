// ndef-poller/ndef/src/types.rs

//! Core value types shared across the crate.

use crate::Error;
use std::convert::TryFrom;

/// NFC Forum tag technology of a discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    /// Type 1 (Topaz family).
    Type1,
    /// Type 2 (NFC-A, 4-byte blocks).
    Type2,
    /// Type 3 (FeliCa).
    Type3,
    /// Type 4 (ISO-DEP, file-based).
    Type4,
    /// Type 5 (NFC-V).
    Type5,
}

/// Life-cycle state of the NDEF management data on a tag.
///
/// Every context starts out `Invalid`; only a successful detection moves it
/// to one of the three operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NdefState {
    /// No valid NDEF structure found, or the session can no longer be
    /// trusted after a failed operation.
    #[default]
    Invalid,
    /// Valid management data, zero-length message.
    Initialized,
    /// Non-empty message, read and write permitted.
    ReadWrite,
    /// Non-empty message, the access bits forbid writing.
    ReadOnly,
}

impl NdefState {
    /// A message (possibly empty) can be read in this state.
    pub fn is_valid(self) -> bool {
        !matches!(self, NdefState::Invalid)
    }

    /// A new message can be stored in this state.
    pub fn is_writable(self) -> bool {
        matches!(self, NdefState::Initialized | NdefState::ReadWrite)
    }
}

/// Mapping-document version, packed major.minor in one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    /// Major version, the compatibility gate.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl Version {
    /// Mapping version 1.0.
    pub const V1_0: Self = Self { major: 1, minor: 0 };
    /// Mapping version 2.0.
    pub const V2_0: Self = Self { major: 2, minor: 0 };
    /// Mapping version 3.0.
    pub const V3_0: Self = Self { major: 3, minor: 0 };

    /// Unpack a `major << 4 | minor` byte.
    pub fn from_byte(b: u8) -> Self {
        Self {
            major: b >> 4,
            minor: b & 0x0F,
        }
    }

    /// Pack into a `major << 4 | minor` byte.
    pub fn as_byte(self) -> u8 {
        (self.major << 4) | (self.minor & 0x0F)
    }
}

/// Snapshot of a tag's NDEF status, produced by detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NdefInfo {
    /// State the detection settled on.
    pub state: NdefState,
    /// Mapping version advertised by the tag.
    pub version: Version,
    /// Size of the NDEF data area in bytes.
    pub area_len: usize,
    /// Estimate of the space still available for a message.
    pub available_len: usize,
    /// Length of the stored message, zero when none.
    pub message_len: usize,
}

/// Tag identifier as reported during discovery (4 to 10 bytes depending on
/// the technology).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid {
    bytes: [u8; 10],
    len: usize,
}

impl Uid {
    /// The identifier bytes, in the order the tag reported them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Lowercase hex form, handy for logs.
    pub fn to_hex(&self) -> String {
        crate::utils::bytes_to_hex(self.as_bytes())
    }
}

impl TryFrom<&[u8]> for Uid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.is_empty() || bytes.len() > 10 {
            return Err(Error::InvalidArgument("uid must be 1 to 10 bytes"));
        }
        let mut arr = [0u8; 10];
        arr[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: arr,
            len: bytes.len(),
        })
    }
}

/// ServiceCode (u16), NFC-F service addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceCode(u16);

impl ServiceCode {
    /// NDEF data read service.
    pub const NDEF_READ: Self = Self(0x000B);
    /// NDEF data write service.
    pub const NDEF_WRITE: Self = Self(0x0009);

    /// Wrap a raw service code.
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The raw code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Little-endian wire form, as FeliCa commands carry it.
    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

/// BlockData, one 16-byte NFC-F block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockData([u8; 16]);

impl BlockData {
    /// Wrap one block's bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The block's bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl TryFrom<&[u8]> for BlockData {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 16 {
            return Err(Error::Protocol(format!(
                "block data must be 16 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes[..16]);
        Ok(Self(arr))
    }
}
