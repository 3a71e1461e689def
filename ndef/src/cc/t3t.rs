// ndef-poller/ndef/src/cc/t3t.rs

//! Type 3 attribute information block, 16 bytes stored in block 0.

use crate::types::Version;

/// Size of the attribute information block in bytes.
pub const AIB_LEN: usize = 16;

/// WriteF value while a write sequence is in progress.
pub const WRITE_FLAG_ON: u8 = 0x0F;
/// WriteF value at rest.
pub const WRITE_FLAG_OFF: u8 = 0x00;

/// RWFlag value for a read-only tag.
pub const RW_FLAG_READ_ONLY: u8 = 0x00;
/// RWFlag value for a writable tag.
pub const RW_FLAG_READ_WRITE: u8 = 0x01;

/// Decoded attribute information block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBlock {
    /// Mapping version of the tag.
    pub version: Version,
    /// Blocks readable in one Check command.
    pub nbr: u8,
    /// Blocks writable in one Update command.
    pub nbw: u8,
    /// Number of data blocks available for the message.
    pub nmaxb: u16,
    /// WriteF, flags an unfinished write sequence.
    pub write_flag: u8,
    /// RWFlag, the access setting.
    pub rw_flag: u8,
    /// Current message length in bytes, 24-bit.
    pub ln: u32,
}

impl AttributeBlock {
    /// Checksum over the first 14 attribute bytes.
    pub fn checksum(bytes: &[u8]) -> u16 {
        bytes[..14].iter().map(|&b| b as u16).sum()
    }

    /// Decode an attribute block. The stored checksum is not verified here;
    /// tags recompute it on every Update and a mismatch surfaces as garbage
    /// fields rejected by detection.
    pub fn from_bytes(bytes: [u8; AIB_LEN]) -> Self {
        Self {
            version: Version::from_byte(bytes[0]),
            nbr: bytes[1],
            nbw: bytes[2],
            nmaxb: u16::from_be_bytes([bytes[3], bytes[4]]),
            write_flag: bytes[9],
            rw_flag: bytes[10],
            ln: u32::from_be_bytes([0, bytes[11], bytes[12], bytes[13]]),
        }
    }

    /// Encode, recomputing the checksum over the first 14 bytes.
    pub fn to_bytes(&self) -> [u8; AIB_LEN] {
        let mut out = [0u8; AIB_LEN];
        out[0] = self.version.as_byte();
        out[1] = self.nbr;
        out[2] = self.nbw;
        out[3..5].copy_from_slice(&self.nmaxb.to_be_bytes());
        // bytes 5..9 are reserved
        out[9] = self.write_flag;
        out[10] = self.rw_flag;
        let ln = self.ln.to_be_bytes();
        out[11..14].copy_from_slice(&ln[1..4]);
        let sum = Self::checksum(&out);
        out[14..16].copy_from_slice(&sum.to_be_bytes());
        out
    }

    /// Message capacity in bytes.
    pub fn area_len(&self) -> usize {
        self.nmaxb as usize * 16
    }

    /// A write sequence was started and never ended.
    pub fn write_in_progress(&self) -> bool {
        self.write_flag != WRITE_FLAG_OFF
    }

    /// The access setting permits Update commands.
    pub fn write_granted(&self) -> bool {
        self.rw_flag == RW_FLAG_READ_WRITE
    }
}
