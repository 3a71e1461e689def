// ndef-poller/ndef/src/poller/t5t.rs

//! Type 5 tag driver (NFC-V, block-organized memory).
//!
//! The CC sits in the first 4 or 8 bytes of block 0 and the TLV area follows
//! it immediately. Block length is a product property discovered from the
//! first read; GetSystemInformation, where the tag answers it, supplies the
//! real memory size for tags whose MLEN field overflows. Some products only
//! accept writes in the special frame format, which is discovered once
//! during formatting and then sticky for the session.

use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::cc::t5t::{T5tCc, CC_LEN_LONG, CC_LEN_SHORT, MAGIC_1_BYTE_ADDR, MAGIC_2_BYTE_ADDR, MLEN_DIVIDER};
use crate::cc::CapabilityContainer;
use crate::tlv;
use crate::transceiver::Transceiver;
use crate::types::{NdefInfo, NdefState, Version};
use crate::{Error, Result, TransceiveError};

use super::{FormatOptions, NdefContext, Session};

/// Error flag in the first byte of every response.
const RESP_FLAG_ERROR: u8 = 0x01;

const INFO_DSFID: u8 = 0x01;
const INFO_AFI: u8 = 0x02;
const INFO_MEM_SIZE: u8 = 0x04;
const INFO_IC_REF: u8 = 0x08;

/// Delay before retrying a refused CC write with the special frame format.
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(20);

/// GetSystemInformation answer, kept for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SystemInfo {
    pub dsfid: Option<u8>,
    pub afi: Option<u8>,
    pub num_blocks: usize,
    pub block_len: usize,
    pub ic_ref: Option<u8>,
}

pub(crate) struct T5tSession {
    block_len: usize,
    cc_len: usize,
    /// Absolute offset of the NDEF Message TLV's T byte.
    ndef_tlv_offset: usize,
    special_frame: bool,
    sys_info: Option<SystemInfo>,
}

impl T5tSession {
    pub(crate) fn new() -> Self {
        Self {
            block_len: 4,
            cc_len: CC_LEN_SHORT,
            ndef_tlv_offset: CC_LEN_SHORT,
            special_frame: false,
            sys_info: None,
        }
    }
}

fn parse_system_information(resp: &[u8], extended: bool) -> Result<SystemInfo> {
    let truncated = || Error::Protocol("truncated system information".to_string());
    if resp.len() < 2 {
        return Err(truncated());
    }
    if resp[0] & RESP_FLAG_ERROR != 0 {
        return Err(Error::Protocol(format!(
            "system information refused, code {:#04x}",
            resp.get(1).copied().unwrap_or_default()
        )));
    }
    let info_flags = resp[1];
    let mut idx = 2 + 8; // flags, info flags, uid
    let mut dsfid = None;
    let mut afi = None;
    if info_flags & INFO_DSFID != 0 {
        dsfid = Some(*resp.get(idx).ok_or_else(truncated)?);
        idx += 1;
    }
    if info_flags & INFO_AFI != 0 {
        afi = Some(*resp.get(idx).ok_or_else(truncated)?);
        idx += 1;
    }
    if info_flags & INFO_MEM_SIZE == 0 {
        return Err(Error::Protocol(
            "system information carries no memory size".to_string(),
        ));
    }
    let num_blocks = if extended {
        let lo = *resp.get(idx).ok_or_else(truncated)?;
        let hi = *resp.get(idx + 1).ok_or_else(truncated)?;
        idx += 2;
        u16::from_le_bytes([lo, hi]) as usize + 1
    } else {
        let n = *resp.get(idx).ok_or_else(truncated)?;
        idx += 1;
        n as usize + 1
    };
    let block_len = (*resp.get(idx).ok_or_else(truncated)? & 0x1F) as usize + 1;
    idx += 1;
    let ic_ref = if info_flags & INFO_IC_REF != 0 {
        resp.get(idx).copied()
    } else {
        None
    };
    Ok(SystemInfo {
        dsfid,
        afi,
        num_blocks,
        block_len,
        ic_ref,
    })
}

fn check_response(resp: &[u8]) -> Result<&[u8]> {
    match resp.first() {
        None => Err(Error::Protocol("empty response".to_string())),
        Some(&flags) if flags & RESP_FLAG_ERROR != 0 => Err(Error::Protocol(format!(
            "tag error, code {:#04x}",
            resp.get(1).copied().unwrap_or_default()
        ))),
        Some(_) => Ok(&resp[1..]),
    }
}

fn read_bytes(
    tr: &mut dyn Transceiver,
    sess: &T5tSession,
    mut offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let block = offset / sess.block_len;
        let block_num = u16::try_from(block)
            .map_err(|_| Error::Protocol(format!("block {} out of range", block)))?;
        let resp = tr.t5t_read_single_block(block_num, block > 0xFF)?;
        let data = check_response(&resp)?;
        if data.len() < sess.block_len {
            return Err(Error::Protocol(format!(
                "block read answered {} bytes instead of {}",
                data.len(),
                sess.block_len
            )));
        }
        let in_block = offset % sess.block_len;
        let take = (sess.block_len - in_block).min(buf.len() - filled);
        buf[filled..filled + take].copy_from_slice(&data[in_block..in_block + take]);
        filled += take;
        offset += take;
    }
    Ok(())
}

fn write_bytes(
    tr: &mut dyn Transceiver,
    sess: &T5tSession,
    mut offset: usize,
    data: &[u8],
) -> Result<()> {
    let mut remaining = data;
    while !remaining.is_empty() {
        let block = offset / sess.block_len;
        let block_num = u16::try_from(block)
            .map_err(|_| Error::Protocol(format!("block {} out of range", block)))?;
        let in_block = offset % sess.block_len;
        let take = remaining.len().min(sess.block_len - in_block);

        let mut chunk = vec![0u8; sess.block_len];
        if in_block != 0 || take < sess.block_len {
            let resp = tr.t5t_read_single_block(block_num, block > 0xFF)?;
            let current = check_response(&resp)?;
            if current.len() < sess.block_len {
                return Err(Error::Protocol(format!(
                    "block read answered {} bytes instead of {}",
                    current.len(),
                    sess.block_len
                )));
            }
            chunk.copy_from_slice(&current[..sess.block_len]);
        }
        chunk[in_block..in_block + take].copy_from_slice(&remaining[..take]);
        tr.t5t_write_single_block(block_num, block > 0xFF, sess.special_frame, &chunk)?;

        offset += take;
        remaining = &remaining[take..];
    }
    Ok(())
}

impl NdefContext {
    pub(crate) fn t5t_read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T5t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 5"));
        };
        read_bytes(transceiver.as_mut(), sess, offset, buf)
    }

    pub(crate) fn t5t_write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let Self {
            transceiver,
            session,
            ..
        } = self;
        let Session::T5t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 5"));
        };
        write_bytes(transceiver.as_mut(), sess, offset, data)
    }

    fn t5t_session(&self) -> Result<&T5tSession> {
        match &self.session {
            Session::T5t(sess) => Ok(sess),
            #[allow(unreachable_patterns)]
            _ => Err(Error::InvalidArgument("session is not type 5")),
        }
    }

    fn t5t_session_mut(&mut self) -> Result<&mut T5tSession> {
        match &mut self.session {
            Session::T5t(sess) => Ok(sess),
            #[allow(unreachable_patterns)]
            _ => Err(Error::InvalidArgument("session is not type 5")),
        }
    }

    /// Discover block length and system information once per session.
    pub(crate) fn t5t_init(&mut self) -> Result<()> {
        let Self {
            transceiver,
            session,
            device,
            ..
        } = self;
        let Session::T5t(sess) = session else {
            return Err(Error::InvalidArgument("session is not type 5"));
        };
        // Selected mode when the transceiver offers it, addressed otherwise.
        match transceiver.t5t_select(&device.uid) {
            Ok(()) | Err(Error::Transceive(TransceiveError::Unsupported)) => {}
            Err(err) => return Err(err),
        }
        let resp = transceiver.t5t_read_single_block(0, false)?;
        let data = check_response(&resp)?;
        if data.is_empty() {
            return Err(Error::Protocol("block 0 answered no data".to_string()));
        }
        sess.block_len = data.len();

        let mut sys_info = None;
        match transceiver.t5t_system_information(true) {
            Ok(resp) => sys_info = parse_system_information(&resp, true).ok(),
            Err(err) => trace!("extended system information unavailable: {}", err),
        }
        if sys_info.is_none() {
            match transceiver.t5t_system_information(false) {
                Ok(resp) => sys_info = parse_system_information(&resp, false).ok(),
                Err(err) => trace!("system information unavailable: {}", err),
            }
        }
        if sys_info.is_none() {
            warn!("tag answers no usable system information");
        }
        sess.sys_info = sys_info;
        debug!(
            "t5t session: block length {}, system information {:?}",
            sess.block_len, sess.sys_info
        );
        Ok(())
    }

    pub(crate) fn t5t_detect(&mut self) -> Result<NdefInfo> {
        let sys_info = self.t5t_session()?.sys_info;

        let mut cc_buf = vec![0u8; CC_LEN_SHORT];
        self.t5t_read_bytes(0, &mut cc_buf)?;
        if cc_buf[2] == 0 {
            cc_buf.resize(CC_LEN_LONG, 0);
            self.t5t_read_bytes(CC_LEN_SHORT, &mut cc_buf[CC_LEN_SHORT..])?;
        }
        let cc = T5tCc::from_bytes(&cc_buf)?;
        if cc.magic != MAGIC_1_BYTE_ADDR && cc.magic != MAGIC_2_BYTE_ADDR {
            return Err(Error::Request(format!(
                "no capability container, byte 0 is {:#04x}",
                cc.magic
            )));
        }
        if cc.version.major > 1 {
            return Err(Error::Request(format!(
                "unsupported mapping version {}.{}",
                cc.version.major, cc.version.minor
            )));
        }
        if !cc.read_granted() {
            return Err(Error::Request("read access denied".to_string()));
        }

        let mut mlen = cc.memory_len as usize;
        if mlen == 0xFF && cc.mlen_overflow {
            match sys_info {
                Some(si) => mlen = si.num_blocks * si.block_len / MLEN_DIVIDER,
                None => {
                    return Err(Error::Request(
                        "mlen overflows and the tag answers no system information".to_string(),
                    ))
                }
            }
        }
        // When MLEN spans the whole physical memory the CC eats into it.
        if let Some(si) = sys_info {
            if si.num_blocks * si.block_len == mlen * MLEN_DIVIDER {
                mlen -= 1;
            }
        }
        self.cc_raw = cc_buf.clone();
        self.cc = Some(CapabilityContainer::T5t(cc));
        self.area_len = mlen * MLEN_DIVIDER;
        {
            let sess = self.t5t_session_mut()?;
            sess.cc_len = cc.cc_len;
            sess.special_frame = cc.special_frame;
        }

        let area_end = cc.cc_len + self.area_len;
        let mut offset = cc.cc_len;
        let mut found = None;
        while offset < area_end {
            let mut t = [0u8];
            self.t5t_read_bytes(offset, &mut t)?;
            match t[0] {
                tlv::TLV_TERMINATOR => break,
                tlv::TLV_NDEF_MESSAGE => {
                    let (len, l_len) = self.t5t_read_tlv_length(offset + 1)?;
                    found = Some((offset, len, l_len));
                    break;
                }
                tlv::TLV_PROPRIETARY => {
                    let (len, l_len) = self.t5t_read_tlv_length(offset + 1)?;
                    offset += 1 + l_len + len;
                }
                other => {
                    return Err(Error::Request(format!(
                        "unexpected tlv type {:#04x}",
                        other
                    )));
                }
            }
        }
        let Some((tlv_offset, len, l_len)) = found else {
            return Err(Error::Request("no ndef message tlv".to_string()));
        };
        self.t5t_session_mut()?.ndef_tlv_offset = tlv_offset;
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
            "t5t message tlv at {}, length {} ({:?})",
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

    fn t5t_read_tlv_length(&mut self, offset: usize) -> Result<(usize, usize)> {
        let mut l = [0u8; 3];
        self.t5t_read_bytes(offset, &mut l[..1])?;
        if l[0] == 0xFF {
            self.t5t_read_bytes(offset + 1, &mut l[1..3])?;
            tlv::parse_length(&l)
        } else {
            tlv::parse_length(&l[..1])
        }
    }

    pub(crate) fn t5t_check_available_space(
        &self,
        sess: &T5tSession,
        message_len: usize,
    ) -> Result<()> {
        let header_len = 1 + tlv::length_field_len(message_len);
        let available =
            (sess.cc_len + self.area_len).saturating_sub(sess.ndef_tlv_offset + header_len);
        if message_len > available {
            return Err(Error::OutOfMemory {
                needed: message_len,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn t5t_begin_write_message(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        self.t5t_write_raw_message_len(0)?;
        let tlv_offset = self.t5t_session()?.ndef_tlv_offset;
        self.message_offset = tlv_offset + 1 + tlv::length_field_len(message_len);
        self.message_len = 0;
        self.state = NdefState::Initialized;
        Ok(())
    }

    pub(crate) fn t5t_end_write_message(&mut self, message_len: usize) -> Result<()> {
        if self.state != NdefState::Initialized {
            return Err(Error::WrongState { state: self.state });
        }
        self.t5t_write_raw_message_len(message_len)?;
        self.message_len = message_len;
        if message_len > 0 {
            self.state = NdefState::ReadWrite;
        }
        Ok(())
    }

    pub(crate) fn t5t_write_raw_message_len(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        let (tlv_offset, cc_len) = {
            let sess = self.t5t_session()?;
            (sess.ndef_tlv_offset, sess.cc_len)
        };
        let header = tlv::ndef_header(message_len)?;
        self.t5t_write_bytes(tlv_offset, &header)?;
        if message_len > 0 {
            let terminator_offset = tlv_offset + header.len() + message_len;
            if terminator_offset < cc_len + self.area_len {
                self.t5t_write_bytes(terminator_offset, &[tlv::TLV_TERMINATOR])?;
            }
        }
        Ok(())
    }

    /// Write a CC and an empty message to a blank tag.
    ///
    /// Without a caller-supplied CC the geometry comes from the tag's system
    /// information. Tags whose memory outgrows the one-byte MLEN get either
    /// the 8-byte CC or, with [`FormatOptions::Android`], the 4-byte CC with
    /// the overflow flag. A refused CC write is retried once in the special
    /// frame format, which some products require for every write.
    pub(crate) fn t5t_format(
        &mut self,
        cc: Option<&CapabilityContainer>,
        options: FormatOptions,
    ) -> Result<()> {
        let sys_info = self.t5t_session()?.sys_info;
        let cc = match cc {
            Some(CapabilityContainer::T5t(cc)) => *cc,
            #[allow(unreachable_patterns)]
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "capability container does not match a type 5 tag",
                ))
            }
            None => {
                let Some(si) = sys_info else {
                    return Err(Error::Request(
                        "formatting needs the tag's system information".to_string(),
                    ));
                };
                self.t5t_default_cc(&si, options)?
            }
        };
        let cc_bytes = cc.to_bytes()?;
        if let Err(err) = self.t5t_write_bytes(0, &cc_bytes) {
            debug!("cc write refused ({}), retrying with special frame", err);
            thread::sleep(WRITE_RETRY_DELAY);
            self.t5t_session_mut()?.special_frame = true;
            self.t5t_write_bytes(0, &cc_bytes)?;
        }
        self.t5t_write_bytes(
            cc_bytes.len(),
            &[tlv::TLV_NDEF_MESSAGE, 0x00, tlv::TLV_TERMINATOR, 0x00],
        )?;

        self.cc_raw = cc_bytes.clone();
        self.cc = Some(CapabilityContainer::T5t(cc));
        self.area_len = cc.area_len();
        self.message_len = 0;
        self.message_offset = cc_bytes.len() + 2;
        {
            let sess = self.t5t_session_mut()?;
            sess.cc_len = cc_bytes.len();
            sess.ndef_tlv_offset = cc_bytes.len();
        }
        self.state = NdefState::Initialized;
        debug!("t5t formatted, area {} bytes", self.area_len);
        Ok(())
    }

    /// Default CC for a blank tag, sized from its system information.
    fn t5t_default_cc(&mut self, si: &SystemInfo, options: FormatOptions) -> Result<T5tCc> {
        let multiple_block_read = match self.transceiver.t5t_read_multiple_blocks(0, 0, false) {
            Ok(resp) => check_response(&resp).is_ok(),
            Err(_) => false,
        };
        let mlen = si.num_blocks * si.block_len / MLEN_DIVIDER;
        let (cc_len, memory_len, mlen_overflow) = if mlen <= 0xFF {
            (CC_LEN_SHORT, mlen as u16, false)
        } else {
            match options {
                // The 8-byte CC consumes one MLEN unit itself.
                FormatOptions::NfcForum => (CC_LEN_LONG, (mlen - 1) as u16, false),
                FormatOptions::Android => (CC_LEN_SHORT, 0xFF, true),
            }
        };
        Ok(T5tCc {
            magic: if si.num_blocks > 256 {
                MAGIC_2_BYTE_ADDR
            } else {
                MAGIC_1_BYTE_ADDR
            },
            version: Version::V1_0,
            read_access: 0,
            write_access: 0,
            memory_len,
            multiple_block_read,
            mlen_overflow,
            lock_block: false,
            special_frame: self.t5t_session()?.special_frame,
            cc_len,
        })
    }

    pub(crate) fn t5t_check_presence(&mut self) -> Result<()> {
        let mut first = [0u8];
        self.t5t_read_bytes(0, &mut first)?;
        Ok(())
    }
}
