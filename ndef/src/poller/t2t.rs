// ndef-poller/ndef/src/poller/t2t.rs

//! Type 2 tag driver (NFC-A, 4-byte blocks).
//!
//! Memory is addressed in 4-byte blocks; a READ returns 16 bytes and rolls
//! over at the sector boundary, so one read is cached and served until a
//! write or a sector change invalidates it. Tags larger than 1 KiB need a
//! SECTOR SELECT before touching the next sector.

use log::{debug, trace};

use crate::cc::t2t::{T2tCc, AREA_OFFSET, CC_LEN, CC_OFFSET, MAGIC};
use crate::cc::CapabilityContainer;
use crate::tlv;
use crate::transceiver::Transceiver;
use crate::types::{NdefInfo, NdefState, Version};
use crate::{Error, Result};

use super::{NdefContext, Session};

const BLOCK_LEN: usize = 4;
const READ_LEN: usize = 16;
/// 256 addressable blocks of 4 bytes per sector.
const SECTOR_LEN: usize = 1024;

struct CachedRead {
    /// Absolute byte offset of `data[0]`.
    offset: usize,
    data: [u8; READ_LEN],
}

pub(crate) struct T2tSession {
    current_sector: u8,
    cache: Option<CachedRead>,
    /// Absolute offset of the NDEF Message TLV's T byte.
    ndef_tlv_offset: usize,
}

impl T2tSession {
    pub(crate) fn new() -> Self {
        Self {
            current_sector: 0,
            cache: None,
            ndef_tlv_offset: 0,
        }
    }
}

fn select_sector(tr: &mut dyn Transceiver, sess: &mut T2tSession, sector: u8) -> Result<()> {
    if sector != sess.current_sector {
        trace!("sector select {}", sector);
        tr.t2t_sector_select(sector)?;
        sess.current_sector = sector;
        sess.cache = None;
    }
    Ok(())
}

fn read_bytes(
    tr: &mut dyn Transceiver,
    sess: &mut T2tSession,
    mut offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let sector = offset / SECTOR_LEN;
        select_sector(tr, sess, sector as u8)?;
        let sector_end = (sector + 1) * SECTOR_LEN;

        let hit = sess
            .cache
            .as_ref()
            .is_some_and(|c| offset >= c.offset && offset < c.offset + READ_LEN);
        if !hit {
            let block = ((offset % SECTOR_LEN) / BLOCK_LEN) as u8;
            let data = tr.t2t_read_block(block)?;
            if data.len() < READ_LEN {
                return Err(Error::Protocol(format!(
                    "read answered {} bytes instead of {}",
                    data.len(),
                    READ_LEN
                )));
            }
            let mut cached = [0u8; READ_LEN];
            cached.copy_from_slice(&data[..READ_LEN]);
            sess.cache = Some(CachedRead {
                offset: sector * SECTOR_LEN + block as usize * BLOCK_LEN,
                data: cached,
            });
        }

        // The cache never serves bytes past the sector boundary; a READ
        // rolls over there and the tail would belong to block 0 again.
        let cache = match sess.cache.as_ref() {
            Some(c) => c,
            None => return Err(Error::Protocol("read cache unexpectedly empty".to_string())),
        };
        let start = offset - cache.offset;
        let end = READ_LEN.min(sector_end - cache.offset);
        let take = (end - start).min(buf.len() - filled);
        buf[filled..filled + take].copy_from_slice(&cache.data[start..start + take]);
        filled += take;
        offset += take;
    }
    Ok(())
}

fn write_bytes(
    tr: &mut dyn Transceiver,
    sess: &mut T2tSession,
    mut offset: usize,
    data: &[u8],
) -> Result<()> {
    sess.cache = None;
    let mut remaining = data;
    while !remaining.is_empty() {
        select_sector(tr, sess, (offset / SECTOR_LEN) as u8)?;
        let block = ((offset % SECTOR_LEN) / BLOCK_LEN) as u8;
        let in_block = offset % BLOCK_LEN;
        let take = remaining.len().min(BLOCK_LEN - in_block);

        let mut chunk = [0u8; BLOCK_LEN];
        if in_block != 0 || take < BLOCK_LEN {
            // Partially covered block, preserve the untouched bytes.
            let current = tr.t2t_read_block(block)?;
            if current.len() < BLOCK_LEN {
                return Err(Error::Protocol(format!(
                    "read answered {} bytes instead of {}",
                    current.len(),
                    READ_LEN
                )));
            }
            chunk.copy_from_slice(&current[..BLOCK_LEN]);
        }
        chunk[in_block..in_block + take].copy_from_slice(&remaining[..take]);
        tr.t2t_write_block(block, &chunk)?;

        offset += take;
        remaining = &remaining[take..];
    }
    Ok(())
}

impl NdefContext {
    pub(crate) fn t2t_read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T2t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 2"));
        };
        read_bytes(transceiver.as_mut(), sess, offset, buf)
    }

    pub(crate) fn t2t_write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T2t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 2"));
        };
        write_bytes(transceiver.as_mut(), sess, offset, data)
    }

    pub(crate) fn t2t_detect(&mut self) -> Result<NdefInfo> {
        let mut cc_buf = [0u8; CC_LEN];
        self.t2t_read_bytes(CC_OFFSET, &mut cc_buf)?;
        let cc = T2tCc::from_bytes(cc_buf);
        if cc.magic != MAGIC {
            return Err(Error::Request(format!(
                "no capability container, byte 0 is {:#04x}",
                cc.magic
            )));
        }
        if cc.version.major > Version::V1_0.major {
            return Err(Error::Request(format!(
                "unsupported mapping version {}.{}",
                cc.version.major, cc.version.minor
            )));
        }
        if !cc.read_granted() {
            return Err(Error::Request("read access denied".to_string()));
        }
        self.cc_raw = cc_buf.to_vec();
        self.area_len = cc.area_len();
        self.cc = Some(CapabilityContainer::T2t(cc));

        // The state stays Invalid until the NDEF TLV is actually located.
        let area_end = AREA_OFFSET + self.area_len;
        let mut offset = AREA_OFFSET;
        let mut found = None;
        while offset < area_end {
            let mut t = [0u8];
            self.t2t_read_bytes(offset, &mut t)?;
            match t[0] {
                tlv::TLV_NULL => offset += 1,
                tlv::TLV_TERMINATOR => break,
                tlv::TLV_LOCK_CONTROL | tlv::TLV_MEMORY_CONTROL => {
                    return Err(Error::Request(
                        "dynamic memory layout tlv present".to_string(),
                    ));
                }
                t => {
                    let (len, l_len) = self.t2t_read_tlv_length(offset + 1)?;
                    if t == tlv::TLV_NDEF_MESSAGE {
                        found = Some((offset, len, l_len));
                        break;
                    }
                    // Proprietary and unknown blocks are skipped whole.
                    offset += 1 + l_len + len;
                }
            }
        }
        let Some((tlv_offset, len, l_len)) = found else {
            return Err(Error::Request("no ndef message tlv".to_string()));
        };
        if let Session::T2t(sess) = &mut self.session {
            sess.ndef_tlv_offset = tlv_offset;
        }
        self.message_offset = tlv_offset + 1 + l_len;
        self.message_len = len;
        if len == 0 {
            if !cc.write_granted() {
                // An empty message that can never be replaced is useless.
                return Err(Error::Request(
                    "empty message on a write-protected tag".to_string(),
                ));
            }
            self.state = NdefState::Initialized;
        } else {
            self.state = if cc.write_granted() {
                NdefState::ReadWrite
            } else {
                NdefState::ReadOnly
            };
        }
        debug!(
            "t2t message tlv at {}, length {} ({:?})",
            tlv_offset, len, self.state
        );
        Ok(NdefInfo {
            state: self.state,
            version: cc.version,
            area_len: self.area_len,
            available_len: area_end - self.message_offset,
            message_len: len,
        })
    }

    /// Read an L field at `offset`, returning the value length and the
    /// field's size.
    fn t2t_read_tlv_length(&mut self, offset: usize) -> Result<(usize, usize)> {
        let mut l = [0u8; 3];
        self.t2t_read_bytes(offset, &mut l[..1])?;
        if l[0] == 0xFF {
            self.t2t_read_bytes(offset + 1, &mut l[1..3])?;
            tlv::parse_length(&l)
        } else {
            tlv::parse_length(&l[..1])
        }
    }

    pub(crate) fn t2t_check_available_space(
        &self,
        sess: &T2tSession,
        message_len: usize,
    ) -> Result<()> {
        let header_len = 1 + tlv::length_field_len(message_len);
        let available =
            (AREA_OFFSET + self.area_len).saturating_sub(sess.ndef_tlv_offset + header_len);
        if message_len > available {
            return Err(Error::OutOfMemory {
                needed: message_len,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn t2t_begin_write_message(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        self.t2t_write_raw_message_len(0)?;
        let tlv_offset = match &self.session {
            Session::T2t(sess) => sess.ndef_tlv_offset,
            #[allow(unreachable_patterns)]
            _ => return Err(Error::InvalidArgument("session is not type 2")),
        };
        self.message_offset = tlv_offset + 1 + tlv::length_field_len(message_len);
        self.message_len = 0;
        self.state = NdefState::Initialized;
        Ok(())
    }

    pub(crate) fn t2t_end_write_message(&mut self, message_len: usize) -> Result<()> {
        if self.state != NdefState::Initialized {
            return Err(Error::WrongState { state: self.state });
        }
        self.t2t_write_raw_message_len(message_len)?;
        self.message_len = message_len;
        if message_len > 0 {
            self.state = NdefState::ReadWrite;
        }
        Ok(())
    }

    pub(crate) fn t2t_write_raw_message_len(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        let tlv_offset = match &self.session {
            Session::T2t(sess) => sess.ndef_tlv_offset,
            #[allow(unreachable_patterns)]
            _ => return Err(Error::InvalidArgument("session is not type 2")),
        };
        let header = tlv::ndef_header(message_len)?;
        self.t2t_write_bytes(tlv_offset, &header)?;
        if message_len > 0 {
            let terminator_offset = tlv_offset + header.len() + message_len;
            if terminator_offset < AREA_OFFSET + self.area_len {
                self.t2t_write_bytes(terminator_offset, &[tlv::TLV_TERMINATOR])?;
            }
        }
        Ok(())
    }

    /// Write a CC and an empty message to a blank tag. Block 3 is usually
    /// one-time programmable, so an existing CC is left alone when its magic
    /// matches and refused otherwise.
    pub(crate) fn t2t_format(&mut self, cc: Option<&CapabilityContainer>) -> Result<()> {
        let cc = match cc {
            Some(CapabilityContainer::T2t(cc)) => *cc,
            #[allow(unreachable_patterns)]
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "capability container does not match a type 2 tag",
                ))
            }
            None => T2tCc::format_default(),
        };
        let mut current = [0u8; CC_LEN];
        self.t2t_read_bytes(CC_OFFSET, &mut current)?;
        if current == [0u8; CC_LEN] {
            self.t2t_write_bytes(CC_OFFSET, &cc.to_bytes())?;
        } else if current[0] != MAGIC {
            return Err(Error::Request(
                "capability container area is not blank".to_string(),
            ));
        }
        self.t2t_write_bytes(
            AREA_OFFSET,
            &[tlv::TLV_NDEF_MESSAGE, 0x00, tlv::TLV_TERMINATOR, 0x00],
        )?;
        debug!("t2t formatted, area {} bytes", cc.area_len());
        Ok(())
    }

    /// One fresh block read. The cache must not answer here, a tag gone
    /// from the field would stay "present" forever.
    pub(crate) fn t2t_check_presence(&mut self) -> Result<()> {
        if let Session::T2t(sess) = &mut self.session {
            sess.cache = None;
        }
        let mut first = [0u8];
        self.t2t_read_bytes(0, &mut first)?;
        Ok(())
    }
}
