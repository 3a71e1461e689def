// ndef-poller/ndef/src/cc/t4t.rs

//! Type 4 capability container file (FID E103h).
//!
//! Two layouts exist: the 15-byte form with a 04h NDEF File Control TLV and
//! a 2-byte file size (mapping versions up to 2.0), and the 17-byte form
//! with a 06h TLV and a 4-byte file size (mapping version 3.0).

use crate::types::Version;
use crate::{Error, Result};

/// CC file length for mapping versions up to 2.0.
pub const CC_LEN_V2: usize = 15;
/// CC file length for mapping version 3.0.
pub const CC_LEN_V3: usize = 17;

/// NDEF File Control TLV tag, versions up to 2.0.
pub const FILE_CONTROL_TLV_V2: u8 = 0x04;
/// Extended NDEF File Control TLV tag, version 3.0.
pub const FILE_CONTROL_TLV_V3: u8 = 0x06;

/// Capability container file id.
pub const CC_FILE_ID: [u8; 2] = [0xE1, 0x03];

/// Access byte value for unrestricted access.
pub const ACCESS_GRANTED: u8 = 0x00;

/// Decoded capability container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct T4tCc {
    /// CCLEN as stored in the file.
    pub cc_len: u16,
    /// Mapping version of the tag.
    pub version: Version,
    /// Maximum response data length the tag accepts.
    pub mle: u16,
    /// Maximum command data length the tag accepts.
    pub mlc: u16,
    /// Id of the NDEF file.
    pub file_id: [u8; 2],
    /// Size of the NDEF file in bytes, length field included.
    pub file_size: u32,
    /// Read access condition byte.
    pub read_access: u8,
    /// Write access condition byte.
    pub write_access: u8,
}

impl T4tCc {
    /// Byte length of the CC file for this mapping version.
    pub fn encoded_len(&self) -> usize {
        if self.version.major >= 3 {
            CC_LEN_V3
        } else {
            CC_LEN_V2
        }
    }

    /// Size of the message length field (NLEN / ENLEN) at file offset 0.
    pub fn nlen_len(&self) -> usize {
        if self.version.major >= 3 { 4 } else { 2 }
    }

    /// Decode a CC file, validating the NDEF File Control TLV.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CC_LEN_V2 {
            return Err(Error::Protocol(format!(
                "cc file too short: {} bytes",
                bytes.len()
            )));
        }
        let version = Version::from_byte(bytes[2]);
        let v3 = version.major >= 3;
        if v3 && bytes.len() < CC_LEN_V3 {
            return Err(Error::Protocol(format!(
                "version 3 cc file too short: {} bytes",
                bytes.len()
            )));
        }

        let (expected_tlv, expected_tlv_len) = if v3 {
            (FILE_CONTROL_TLV_V3, 8u8)
        } else {
            (FILE_CONTROL_TLV_V2, 6u8)
        };
        if bytes[7] != expected_tlv || bytes[8] != expected_tlv_len {
            return Err(Error::Protocol(format!(
                "bad ndef file control tlv: type={:#04x} len={}",
                bytes[7], bytes[8]
            )));
        }

        let (file_size, read_access, write_access) = if v3 {
            (
                u32::from_be_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]),
                bytes[15],
                bytes[16],
            )
        } else {
            (
                u32::from(u16::from_be_bytes([bytes[11], bytes[12]])),
                bytes[13],
                bytes[14],
            )
        };

        Ok(Self {
            cc_len: u16::from_be_bytes([bytes[0], bytes[1]]),
            version,
            mle: u16::from_be_bytes([bytes[3], bytes[4]]),
            mlc: u16::from_be_bytes([bytes[5], bytes[6]]),
            file_id: [bytes[9], bytes[10]],
            file_size,
            read_access,
            write_access,
        })
    }

    /// Encode in the layout matching the mapping version.
    pub fn to_bytes(&self) -> Vec<u8> {
        let v3 = self.version.major >= 3;
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.cc_len.to_be_bytes());
        out.push(self.version.as_byte());
        out.extend_from_slice(&self.mle.to_be_bytes());
        out.extend_from_slice(&self.mlc.to_be_bytes());
        if v3 {
            out.push(FILE_CONTROL_TLV_V3);
            out.push(8);
            out.extend_from_slice(&self.file_id);
            out.extend_from_slice(&self.file_size.to_be_bytes());
        } else {
            out.push(FILE_CONTROL_TLV_V2);
            out.push(6);
            out.extend_from_slice(&self.file_id);
            out.extend_from_slice(&(self.file_size as u16).to_be_bytes());
        }
        out.push(self.read_access);
        out.push(self.write_access);
        out
    }

    /// Read access is unrestricted.
    pub fn read_granted(&self) -> bool {
        self.read_access == ACCESS_GRANTED
    }

    /// Write access is unrestricted.
    pub fn write_granted(&self) -> bool {
        self.write_access == ACCESS_GRANTED
    }
}
