// ndef-poller/ndef/src/tlv.rs

//! TLV blocks of the Type 2 / Type 5 NDEF data area.
//!
//! The L field comes in two forms: a single byte for values up to 254, and a
//! three-byte form (FFh escape followed by a big-endian u16) for anything
//! larger.

use crate::{Error, Result};

/// NULL TLV, a single padding byte.
pub const TLV_NULL: u8 = 0x00;
/// Lock Control TLV.
pub const TLV_LOCK_CONTROL: u8 = 0x01;
/// Memory Control TLV.
pub const TLV_MEMORY_CONTROL: u8 = 0x02;
/// NDEF Message TLV.
pub const TLV_NDEF_MESSAGE: u8 = 0x03;
/// Proprietary TLV, skipped during the scan.
pub const TLV_PROPRIETARY: u8 = 0xFD;
/// Terminator TLV, ends the data area.
pub const TLV_TERMINATOR: u8 = 0xFE;

/// Largest value length the single-byte L form can carry.
pub const SHORT_LEN_MAX: usize = 254;

/// Largest value length the three-byte L form can carry.
pub const LONG_LEN_MAX: usize = 0xFFFF;

/// Size in bytes of the L field encoding `len`.
pub fn length_field_len(len: usize) -> usize {
    if len <= SHORT_LEN_MAX { 1 } else { 3 }
}

/// Append the L field for `len` to `out`.
pub fn push_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if len > LONG_LEN_MAX {
        return Err(Error::InvalidArgument("tlv length exceeds 65535"));
    }
    if len <= SHORT_LEN_MAX {
        out.push(len as u8);
    } else {
        out.push(0xFF);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    Ok(())
}

/// Encode the T and L fields of an NDEF Message TLV.
pub fn ndef_header(len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(1 + length_field_len(len));
    out.push(TLV_NDEF_MESSAGE);
    push_length(&mut out, len)?;
    Ok(out)
}

/// Decode an L field. Returns the value length and the number of bytes the
/// field occupies.
pub fn parse_length(buf: &[u8]) -> Result<(usize, usize)> {
    match buf.first() {
        None => Err(Error::Protocol("truncated tlv length field".to_string())),
        Some(&0xFF) => {
            if buf.len() < 3 {
                return Err(Error::Protocol("truncated 3-byte tlv length".to_string()));
            }
            Ok((u16::from_be_bytes([buf[1], buf[2]]) as usize, 3))
        }
        Some(&b) => Ok((b as usize, 1)),
    }
}
