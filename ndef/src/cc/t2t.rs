// ndef-poller/ndef/src/cc/t2t.rs

//! Type 2 capability container, 4 bytes at byte offset 12.

use crate::types::Version;

/// Byte offset of the CC within tag memory.
pub const CC_OFFSET: usize = 12;
/// Size of the CC in bytes.
pub const CC_LEN: usize = 4;
/// First byte of the NDEF data area.
pub const AREA_OFFSET: usize = 16;

/// Magic number in the first CC byte.
pub const MAGIC: u8 = 0xE1;
/// The size byte counts the data area in 8-byte units.
pub const SIZE_DIVIDER: usize = 8;
/// Data area of a static-memory tag.
pub const STATIC_AREA_LEN: usize = 48;

/// Decoded capability container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct T2tCc {
    /// Must equal [`MAGIC`] for a managed tag.
    pub magic: u8,
    /// Mapping version of the tag.
    pub version: Version,
    /// Data area length in 8-byte units.
    pub size: u8,
    /// Read access nibble, 0h = unrestricted.
    pub read_access: u8,
    /// Write access nibble, 0h = unrestricted, Fh = locked.
    pub write_access: u8,
}

impl T2tCc {
    /// CC written when formatting a blank tag: E1h, version 1.0, 48-byte
    /// area, unrestricted access.
    pub fn format_default() -> Self {
        Self {
            magic: MAGIC,
            version: Version::V1_0,
            size: (STATIC_AREA_LEN / SIZE_DIVIDER) as u8,
            read_access: 0x0,
            write_access: 0x0,
        }
    }

    /// Decode the 4 CC bytes.
    pub fn from_bytes(bytes: [u8; CC_LEN]) -> Self {
        Self {
            magic: bytes[0],
            version: Version::from_byte(bytes[1]),
            size: bytes[2],
            read_access: bytes[3] >> 4,
            write_access: bytes[3] & 0x0F,
        }
    }

    /// Encode back into the 4 CC bytes.
    pub fn to_bytes(&self) -> [u8; CC_LEN] {
        [
            self.magic,
            self.version.as_byte(),
            self.size,
            (self.read_access << 4) | (self.write_access & 0x0F),
        ]
    }

    /// Data area size in bytes.
    pub fn area_len(&self) -> usize {
        self.size as usize * SIZE_DIVIDER
    }

    /// Read access is unrestricted.
    pub fn read_granted(&self) -> bool {
        self.read_access == 0x0
    }

    /// Write access is unrestricted.
    pub fn write_granted(&self) -> bool {
        self.write_access == 0x0
    }
}
