// ndef-poller/ndef/src/poller/t3t.rs

//! Type 3 tag driver (NFC-F, Check/Update on 16-byte blocks).
//!
//! Block 0 holds the attribute information block; the message occupies the
//! data blocks after it. A write sequence raises WriteF in the attribute
//! block first and clears it together with the new Ln afterwards, so an
//! interrupted write is detectable on the next detection.

use log::{debug, trace};

use crate::cc::t3t::{AttributeBlock, WRITE_FLAG_OFF, WRITE_FLAG_ON};
use crate::cc::CapabilityContainer;
use crate::transceiver::Transceiver;
use crate::types::{BlockData, NdefInfo, NdefState, ServiceCode};
use crate::{Error, Result};

use super::{NdefContext, Session};

const BLOCK_LEN: usize = 16;
/// Data blocks start after the attribute block.
const FIRST_DATA_BLOCK: usize = 1;

pub(crate) struct T3tSession {
    nbr: usize,
    nbw: usize,
}

impl T3tSession {
    pub(crate) fn new() -> Self {
        Self { nbr: 1, nbw: 1 }
    }
}

fn block_number(block: usize) -> Result<u16> {
    u16::try_from(block).map_err(|_| Error::Protocol(format!("block {} out of range", block)))
}

/// Read `buf.len()` bytes starting at byte `offset` of the data area,
/// batching up to Nbr blocks per Check.
fn read_bytes(
    tr: &mut dyn Transceiver,
    sess: &T3tSession,
    mut offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let first = FIRST_DATA_BLOCK + offset / BLOCK_LEN;
        let in_block = offset % BLOCK_LEN;
        let remaining = buf.len() - filled;
        let wanted_blocks = (in_block + remaining).div_ceil(BLOCK_LEN).min(sess.nbr);
        let mut list = Vec::with_capacity(wanted_blocks);
        for i in 0..wanted_blocks {
            list.push(block_number(first + i)?);
        }
        trace!("check blocks {:?}", list);
        let blocks = tr.t3t_check(ServiceCode::NDEF_READ, &list)?;
        if blocks.len() != wanted_blocks {
            return Err(Error::Protocol(format!(
                "check answered {} blocks instead of {}",
                blocks.len(),
                wanted_blocks
            )));
        }
        let available = wanted_blocks * BLOCK_LEN - in_block;
        let take = remaining.min(available);
        let mut copied = 0;
        for (i, block) in blocks.iter().enumerate() {
            let start = if i == 0 { in_block } else { 0 };
            let data = &block.as_bytes()[start..];
            let n = data.len().min(take - copied);
            buf[filled + copied..filled + copied + n].copy_from_slice(&data[..n]);
            copied += n;
            if copied == take {
                break;
            }
        }
        filled += take;
        offset += take;
    }
    Ok(())
}

/// Write `data` at byte `offset` of the data area, preserving bytes outside
/// the range on partially covered blocks and batching up to Nbw blocks per
/// Update.
fn write_bytes(
    tr: &mut dyn Transceiver,
    sess: &T3tSession,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let first = FIRST_DATA_BLOCK + offset / BLOCK_LEN;
    let last = FIRST_DATA_BLOCK + (offset + data.len() - 1) / BLOCK_LEN;
    let mut pending: Vec<(u16, BlockData)> = Vec::new();
    for block in first..=last {
        let block_start = (block - FIRST_DATA_BLOCK) * BLOCK_LEN;
        let covered_from = offset.max(block_start);
        let covered_to = (offset + data.len()).min(block_start + BLOCK_LEN);
        let mut bytes = [0u8; BLOCK_LEN];
        if covered_to - covered_from < BLOCK_LEN {
            let current = tr.t3t_check(ServiceCode::NDEF_READ, &[block_number(block)?])?;
            let current = current
                .first()
                .ok_or_else(|| Error::Protocol("check answered no blocks".to_string()))?;
            bytes.copy_from_slice(current.as_bytes());
        }
        bytes[covered_from - block_start..covered_to - block_start]
            .copy_from_slice(&data[covered_from - offset..covered_to - offset]);
        pending.push((block_number(block)?, BlockData::from_bytes(bytes)));
        if pending.len() == sess.nbw {
            tr.t3t_update(ServiceCode::NDEF_WRITE, &pending)?;
            pending.clear();
        }
    }
    if !pending.is_empty() {
        tr.t3t_update(ServiceCode::NDEF_WRITE, &pending)?;
    }
    Ok(())
}

impl NdefContext {
    pub(crate) fn t3t_read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T3t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 3"));
        };
        read_bytes(transceiver.as_mut(), sess, offset, buf)
    }

    pub(crate) fn t3t_write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T3t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 3"));
        };
        write_bytes(transceiver.as_mut(), sess, offset, data)
    }

    fn t3t_attribute_block(&self) -> Result<AttributeBlock> {
        match self.cc {
            Some(CapabilityContainer::T3t(aib)) => Ok(aib),
            _ => Err(Error::WrongState { state: self.state }),
        }
    }

    /// Rewrite the attribute block with the given WriteF and Ln.
    fn t3t_write_attribute(&mut self, write_flag: u8, ln: u32) -> Result<()> {
        let mut aib = self.t3t_attribute_block()?;
        aib.write_flag = write_flag;
        aib.ln = ln;
        let bytes = aib.to_bytes();
        self.transceiver.t3t_update(
            ServiceCode::NDEF_WRITE,
            &[(0, BlockData::from_bytes(bytes))],
        )?;
        self.cc = Some(CapabilityContainer::T3t(aib));
        self.cc_raw = bytes.to_vec();
        Ok(())
    }

    pub(crate) fn t3t_detect(&mut self) -> Result<NdefInfo> {
        let blocks = self.transceiver.t3t_check(ServiceCode::NDEF_READ, &[0])?;
        let block = blocks
            .first()
            .ok_or_else(|| Error::Protocol("check answered no blocks".to_string()))?;
        let bytes = *block.as_bytes();
        let stored = u16::from_be_bytes([bytes[14], bytes[15]]);
        if AttributeBlock::checksum(&bytes) != stored {
            return Err(Error::Protocol(format!(
                "attribute block checksum mismatch, stored {:#06x}",
                stored
            )));
        }
        let aib = AttributeBlock::from_bytes(bytes);
        if aib.version.major > 1 {
            return Err(Error::Request(format!(
                "unsupported mapping version {}.{}",
                aib.version.major, aib.version.minor
            )));
        }
        if aib.nbr == 0 || aib.nbw == 0 || aib.nmaxb == 0 {
            return Err(Error::Protocol(
                "attribute block advertises zero capacity".to_string(),
            ));
        }
        self.cc_raw = bytes.to_vec();
        self.cc = Some(CapabilityContainer::T3t(aib));
        self.area_len = aib.area_len();
        if let Session::T3t(sess) = &mut self.session {
            sess.nbr = aib.nbr as usize;
            sess.nbw = aib.nbw as usize;
        }
        if aib.write_in_progress() {
            // A write sequence died between WriteF on and off; the message
            // bytes cannot be trusted.
            return Err(Error::Request("interrupted write sequence".to_string()));
        }
        let ln = aib.ln as usize;
        if ln > self.area_len {
            return Err(Error::Protocol(format!(
                "ln {} exceeds the {}-byte data area",
                ln, self.area_len
            )));
        }
        self.message_len = ln;
        self.message_offset = 0;
        if ln == 0 {
            if !aib.write_granted() {
                // An empty message that can never be replaced is useless.
                return Err(Error::Request(
                    "empty message on a read-only tag".to_string(),
                ));
            }
            self.state = NdefState::Initialized;
        } else {
            self.state = if aib.write_granted() {
                NdefState::ReadWrite
            } else {
                NdefState::ReadOnly
            };
        }
        debug!(
            "t3t attribute block: nbr {} nbw {} nmaxb {} ln {} ({:?})",
            aib.nbr, aib.nbw, aib.nmaxb, ln, self.state
        );
        Ok(NdefInfo {
            state: self.state,
            version: aib.version,
            area_len: self.area_len,
            available_len: self.area_len,
            message_len: ln,
        })
    }

    pub(crate) fn t3t_check_available_space(&self, message_len: usize) -> Result<()> {
        if message_len > self.area_len {
            return Err(Error::OutOfMemory {
                needed: message_len,
                available: self.area_len,
            });
        }
        Ok(())
    }

    pub(crate) fn t3t_begin_write_message(&mut self, _message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        self.t3t_write_attribute(WRITE_FLAG_ON, 0)?;
        self.message_offset = 0;
        self.message_len = 0;
        self.state = NdefState::Initialized;
        Ok(())
    }

    pub(crate) fn t3t_end_write_message(&mut self, message_len: usize) -> Result<()> {
        if self.state != NdefState::Initialized {
            return Err(Error::WrongState { state: self.state });
        }
        self.t3t_write_raw_message_len(message_len)?;
        self.message_len = message_len;
        if message_len > 0 {
            self.state = NdefState::ReadWrite;
        }
        Ok(())
    }

    pub(crate) fn t3t_write_raw_message_len(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        let len = u32::try_from(message_len)
            .ok()
            .filter(|&l| l as usize <= self.area_len)
            .ok_or(Error::InvalidArgument("message length exceeds the data area"))?;
        self.t3t_write_attribute(WRITE_FLAG_OFF, len)
    }

    /// Store a caller-supplied attribute block on a blank tag. Nbr, Nbw and
    /// NmaxB depend on the product, so there is no usable default.
    pub(crate) fn t3t_format(&mut self, cc: Option<&CapabilityContainer>) -> Result<()> {
        let mut aib = match cc {
            Some(CapabilityContainer::T3t(aib)) => *aib,
            #[allow(unreachable_patterns)]
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "capability container does not match a type 3 tag",
                ))
            }
            None => {
                return Err(Error::InvalidArgument(
                    "formatting a type 3 tag needs an attribute block",
                ))
            }
        };
        aib.write_flag = WRITE_FLAG_OFF;
        aib.ln = 0;
        let bytes = aib.to_bytes();
        self.transceiver.t3t_update(
            ServiceCode::NDEF_WRITE,
            &[(0, BlockData::from_bytes(bytes))],
        )?;
        debug!("t3t formatted, {} data blocks", aib.nmaxb);
        Ok(())
    }

    pub(crate) fn t3t_check_presence(&mut self) -> Result<()> {
        self.transceiver
            .t3t_check(ServiceCode::NDEF_READ, &[0])
            .map(|_| ())
    }
}
