// ndef-poller/ndef/src/cc/t5t.rs

//! Type 5 capability container, first 4 or 8 bytes of block 0.
//!
//! The 4-byte form carries the memory length in byte 2; when that byte is
//! zero the CC is the 8-byte form and the length sits in bytes 6..8 as a
//! big-endian u16.

use crate::types::Version;
use crate::{Error, Result};

/// Size of the 4-byte CC form.
pub const CC_LEN_SHORT: usize = 4;
/// Size of the 8-byte CC form.
pub const CC_LEN_LONG: usize = 8;

/// Magic for tags answering one-byte block addresses.
pub const MAGIC_1_BYTE_ADDR: u8 = 0xE1;
/// Magic for tags requiring two-byte block addresses.
pub const MAGIC_2_BYTE_ADDR: u8 = 0xE2;

/// The MLEN field counts the data area in 8-byte units.
pub const MLEN_DIVIDER: usize = 8;

const FLAG_MBREAD: u8 = 0x01;
const FLAG_MLEN_OVERFLOW: u8 = 0x04;
const FLAG_LOCK_BLOCK: u8 = 0x08;
const FLAG_SPECIAL_FRAME: u8 = 0x10;

/// Decoded capability container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct T5tCc {
    /// E1h or E2h, selects the block addressing width.
    pub magic: u8,
    /// Mapping version of the tag.
    pub version: Version,
    /// Read access, 2 bits, 0 = unrestricted.
    pub read_access: u8,
    /// Write access, 2 bits, 0 = unrestricted, 3 = locked.
    pub write_access: u8,
    /// Data area length in 8-byte units.
    pub memory_len: u16,
    /// Tag supports ReadMultipleBlocks.
    pub multiple_block_read: bool,
    /// Real memory exceeds what MLEN can encode; ask the tag itself.
    pub mlen_overflow: bool,
    /// Tag supports LockBlock.
    pub lock_block: bool,
    /// Writes need the special frame format.
    pub special_frame: bool,
    /// Encoded CC size, 4 or 8 bytes.
    pub cc_len: usize,
}

impl T5tCc {
    /// Decode a CC, choosing the 4-byte or 8-byte form by byte 2.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CC_LEN_SHORT {
            return Err(Error::Protocol(format!(
                "cc too short: {} bytes",
                bytes.len()
            )));
        }
        let (memory_len, cc_len) = if bytes[2] == 0 {
            if bytes.len() < CC_LEN_LONG {
                return Err(Error::Protocol(format!(
                    "8-byte cc truncated: {} bytes",
                    bytes.len()
                )));
            }
            (u16::from_be_bytes([bytes[6], bytes[7]]), CC_LEN_LONG)
        } else {
            (u16::from(bytes[2]), CC_LEN_SHORT)
        };
        Ok(Self {
            magic: bytes[0],
            version: Version {
                major: bytes[1] >> 6,
                minor: (bytes[1] >> 4) & 0x03,
            },
            read_access: (bytes[1] >> 2) & 0x03,
            write_access: bytes[1] & 0x03,
            memory_len,
            multiple_block_read: bytes[3] & FLAG_MBREAD != 0,
            mlen_overflow: bytes[3] & FLAG_MLEN_OVERFLOW != 0,
            lock_block: bytes[3] & FLAG_LOCK_BLOCK != 0,
            special_frame: bytes[3] & FLAG_SPECIAL_FRAME != 0,
            cc_len,
        })
    }

    /// Encode in the form `cc_len` selects.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.cc_len);
        out.push(self.magic);
        out.push(
            (self.version.major << 6)
                | ((self.version.minor & 0x03) << 4)
                | ((self.read_access & 0x03) << 2)
                | (self.write_access & 0x03),
        );
        let mut flags = 0u8;
        if self.multiple_block_read {
            flags |= FLAG_MBREAD;
        }
        if self.mlen_overflow {
            flags |= FLAG_MLEN_OVERFLOW;
        }
        if self.lock_block {
            flags |= FLAG_LOCK_BLOCK;
        }
        if self.special_frame {
            flags |= FLAG_SPECIAL_FRAME;
        }
        match self.cc_len {
            CC_LEN_SHORT => {
                if self.memory_len == 0 || self.memory_len > 0xFF {
                    return Err(Error::InvalidArgument(
                        "memory length does not fit the 4-byte cc form",
                    ));
                }
                out.push(self.memory_len as u8);
                out.push(flags);
            }
            CC_LEN_LONG => {
                out.push(0x00);
                out.push(flags);
                out.extend_from_slice(&[0x00, 0x00]);
                out.extend_from_slice(&self.memory_len.to_be_bytes());
            }
            _ => return Err(Error::InvalidArgument("cc length must be 4 or 8")),
        }
        Ok(out)
    }

    /// Data area size in bytes.
    pub fn area_len(&self) -> usize {
        self.memory_len as usize * MLEN_DIVIDER
    }

    /// Read access is unrestricted.
    pub fn read_granted(&self) -> bool {
        self.read_access == 0x00
    }

    /// Write access is unrestricted.
    pub fn write_granted(&self) -> bool {
        self.write_access == 0x00
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_short_form() {
        // ST25TV02K style CC: 0x40 mlen = 512 byte area
        let cc = T5tCc::from_bytes(&[0xE1, 0x40, 0x40, 0x01]).unwrap();
        assert_eq!(cc.magic, MAGIC_1_BYTE_ADDR);
        assert_eq!(cc.version, Version { major: 1, minor: 0 });
        assert_eq!(cc.cc_len, CC_LEN_SHORT);
        assert_eq!(cc.area_len(), 512);
        assert!(cc.multiple_block_read);
        assert!(!cc.special_frame);
        assert!(cc.read_granted() && cc.write_granted());
    }

    #[test]
    fn decode_long_form() {
        let cc = T5tCc::from_bytes(&[0xE2, 0x40, 0x00, 0x01, 0x00, 0x00, 0x04, 0x00]).unwrap();
        assert_eq!(cc.magic, MAGIC_2_BYTE_ADDR);
        assert_eq!(cc.cc_len, CC_LEN_LONG);
        assert_eq!(cc.memory_len, 0x0400);
        assert_eq!(cc.area_len(), 8192);
    }

    #[test]
    fn truncated_long_form_rejected() {
        assert!(T5tCc::from_bytes(&[0xE2, 0x40, 0x00, 0x01]).is_err());
    }

    #[test]
    fn short_form_cannot_hold_large_mlen() {
        let cc = T5tCc {
            magic: MAGIC_1_BYTE_ADDR,
            version: Version::V1_0,
            read_access: 0,
            write_access: 0,
            memory_len: 0x400,
            multiple_block_read: false,
            mlen_overflow: false,
            lock_block: false,
            special_frame: false,
            cc_len: CC_LEN_SHORT,
        };
        assert!(cc.to_bytes().is_err());
    }

    proptest! {
        #[test]
        fn roundtrip(magic in prop::sample::select(vec![0xE1u8, 0xE2]),
                     major in 0u8..=3, minor in 0u8..=3,
                     read in 0u8..=3, write in 0u8..=3,
                     mlen in 1u16..=0xFFFF,
                     mbread in any::<bool>(), overflow in any::<bool>(),
                     lock in any::<bool>(), special in any::<bool>()) {
            let cc_len = if mlen <= 0xFF { CC_LEN_SHORT } else { CC_LEN_LONG };
            let cc = T5tCc {
                magic,
                version: Version { major, minor },
                read_access: read,
                write_access: write,
                memory_len: mlen,
                multiple_block_read: mbread,
                mlen_overflow: overflow,
                lock_block: lock,
                special_frame: special,
                cc_len,
            };
            let bytes = cc.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), cc_len);
            prop_assert_eq!(T5tCc::from_bytes(&bytes).unwrap(), cc);
        }
    }
}
