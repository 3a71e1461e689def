// ndef-poller/ndef/src/poller/mod.rs

//! Technology-agnostic NDEF poller.
//!
//! [`NdefContext`] owns one tag session: the transceiver handle, the
//! discovered device, the state machine and the per-technology working
//! state. The driver is chosen once, when the context is created, from the
//! device's listen technology; every operation afterwards dispatches on the
//! session variant.

use log::{debug, trace, warn};

use crate::cc::CapabilityContainer;
use crate::message::Message;
use crate::transceiver::{DiscoveredDevice, Transceiver};
use crate::types::{NdefInfo, NdefState, TagType};
use crate::{Error, Result};

#[cfg(feature = "t2t")]
pub mod t2t;
#[cfg(feature = "t3t")]
pub mod t3t;
#[cfg(feature = "t4t")]
pub mod t4t;
#[cfg(feature = "t5t")]
pub mod t5t;

/// Formatting flavor for technologies where more than one CC layout is in
/// the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatOptions {
    /// Strict NFC Forum sizing (8-byte CC once MLEN outgrows one byte).
    #[default]
    NfcForum,
    /// Android convention: 4-byte CC with the MLEN overflow flag.
    Android,
}

/// Per-technology working state, exactly one variant per session.
pub(crate) enum Session {
    #[cfg(feature = "t2t")]
    T2t(t2t::T2tSession),
    #[cfg(feature = "t3t")]
    T3t(t3t::T3tSession),
    #[cfg(feature = "t4t")]
    T4t(t4t::T4tSession),
    #[cfg(feature = "t5t")]
    T5t(t5t::T5tSession),
}

/// One NDEF session on one physical tag.
pub struct NdefContext {
    pub(crate) transceiver: Box<dyn Transceiver>,
    pub(crate) device: DiscoveredDevice,
    pub(crate) state: NdefState,
    pub(crate) cc: Option<CapabilityContainer>,
    /// CC / attribute block bytes exactly as read from the tag.
    pub(crate) cc_raw: Vec<u8>,
    pub(crate) message_len: usize,
    /// Absolute offset of the first message byte (start of the V field).
    pub(crate) message_offset: usize,
    /// NDEF data area length in bytes.
    pub(crate) area_len: usize,
    pub(crate) session: Session,
}

impl NdefContext {
    /// Bind a discovered device to its technology driver.
    ///
    /// Fails with [`Error::NotSupported`] when no driver is compiled in for
    /// the device's technology (Type 1 never has one). For Type 5 this also
    /// asks the tag for its block length and system information.
    pub fn new(transceiver: Box<dyn Transceiver>, device: DiscoveredDevice) -> Result<Self> {
        let tag_type = device.tag_type();
        let session = match tag_type {
            #[cfg(feature = "t2t")]
            TagType::Type2 => Session::T2t(t2t::T2tSession::new()),
            #[cfg(feature = "t3t")]
            TagType::Type3 => Session::T3t(t3t::T3tSession::new()),
            #[cfg(feature = "t4t")]
            TagType::Type4 => Session::T4t(t4t::T4tSession::new()),
            #[cfg(feature = "t5t")]
            TagType::Type5 => Session::T5t(t5t::T5tSession::new()),
            other => {
                warn!("no driver for {:?}", other);
                return Err(Error::NotSupported(other));
            }
        };
        let mut ctx = Self {
            transceiver,
            device,
            state: NdefState::Invalid,
            cc: None,
            cc_raw: Vec::new(),
            message_len: 0,
            message_offset: 0,
            area_len: 0,
            session,
        };
        ctx.driver_init()?;
        debug!("ndef context bound to {:?} ({})", tag_type, ctx.device.uid.to_hex());
        Ok(ctx)
    }

    /// Technology driving this session.
    pub fn tag_type(&self) -> TagType {
        self.device.tag_type()
    }

    /// Current life-cycle state.
    pub fn state(&self) -> NdefState {
        self.state
    }

    /// Length of the stored message as of the last detection or write.
    pub fn message_len(&self) -> usize {
        self.message_len
    }

    /// Decoded capability container, once a detection has read one.
    pub fn capability_container(&self) -> Option<&CapabilityContainer> {
        self.cc.as_ref()
    }

    /// CC / attribute block bytes as last read from the tag.
    pub fn raw_cc(&self) -> &[u8] {
        &self.cc_raw
    }

    /// Run the technology's NDEF detection procedure.
    ///
    /// The state is reset to `Invalid` first so a failed detection never
    /// leaves a stale valid state behind.
    pub fn detect(&mut self) -> Result<NdefInfo> {
        self.state = NdefState::Invalid;
        self.message_len = 0;
        self.message_offset = 0;
        let result = match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_detect(),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_detect(),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_detect(),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_detect(),
        };
        match &result {
            Ok(info) => debug!(
                "detect {:?}: state {:?}, message {} of {} bytes",
                self.tag_type(),
                info.state,
                info.message_len,
                info.area_len
            ),
            Err(err) => debug!("detect {:?} failed: {}", self.tag_type(), err),
        }
        result
    }

    /// Read the stored NDEF message into `buf`. Returns the number of bytes
    /// read (the message length except for a tag cut short mid-exchange).
    ///
    /// Requires `ReadWrite` or `ReadOnly`; an `Initialized` tag has nothing
    /// to read and is rejected with `WrongState`.
    pub fn read_raw_message(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !matches!(self.state, NdefState::ReadWrite | NdefState::ReadOnly) {
            return Err(Error::WrongState { state: self.state });
        }
        if self.message_len > buf.len() {
            return Err(Error::OutOfMemory {
                needed: self.message_len,
                available: buf.len(),
            });
        }
        let len = self.message_len;
        let offset = self.message_offset;
        match self.driver_read_bytes(offset, &mut buf[..len]) {
            Ok(read) => Ok(read),
            Err(err) => {
                self.state = NdefState::Invalid;
                Err(err)
            }
        }
    }

    /// Write `buf` as the new raw NDEF message, using the begin/write/end
    /// sequence so a reader interrupting mid-write sees an empty message,
    /// never a truncated one.
    pub fn write_raw_message(&mut self, buf: &[u8]) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        self.check_available_space(buf.len())?;
        self.begin_write_message(buf.len())?;
        if !buf.is_empty() {
            let offset = self.message_offset;
            if let Err(err) = self.driver_write_bytes(offset, buf) {
                self.state = NdefState::Invalid;
                return Err(err);
            }
        }
        self.end_write_message(buf.len())
    }

    /// Serialize `message` record by record and store it on the tag.
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        let total_len = message.encoded_len();
        self.check_available_space(total_len)?;
        self.begin_write_message(total_len)?;
        let mut offset = self.message_offset;
        let last = message.records().len().saturating_sub(1);
        let mut encoded = Vec::new();
        for (i, record) in message.records().iter().enumerate() {
            encoded.clear();
            record.encode_into(&mut encoded, i == 0, i == last);
            trace!("write record {} ({} bytes) at offset {}", i, encoded.len(), offset);
            if let Err(err) = self.driver_write_bytes(offset, &encoded) {
                self.state = NdefState::Invalid;
                return Err(err);
            }
            offset += encoded.len();
        }
        self.end_write_message(total_len)
    }

    /// Check that a message of `message_len` bytes plus its TLV or length
    /// field overhead fits the tag. Never mutates the session.
    pub fn check_available_space(&self, message_len: usize) -> Result<()> {
        if self.state == NdefState::Invalid {
            return Err(Error::WrongState { state: self.state });
        }
        match &self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(sess) => self.t2t_check_available_space(sess, message_len),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_check_available_space(message_len),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_check_available_space(message_len),
            #[cfg(feature = "t5t")]
            Session::T5t(sess) => self.t5t_check_available_space(sess, message_len),
        }
    }

    /// Reset the tag's length field to zero ahead of a payload write. On
    /// success the state is `Initialized` and `message_offset` points where
    /// the payload of a `message_len`-byte message must go.
    pub fn begin_write_message(&mut self, message_len: usize) -> Result<()> {
        let result = match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_begin_write_message(message_len),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_begin_write_message(message_len),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_begin_write_message(message_len),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_begin_write_message(message_len),
        };
        if result.is_err() {
            self.state = NdefState::Invalid;
        }
        result
    }

    /// Write the true message length, completing a write sequence started
    /// with [`begin_write_message`](Self::begin_write_message).
    pub fn end_write_message(&mut self, message_len: usize) -> Result<()> {
        let result = match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_end_write_message(message_len),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_end_write_message(message_len),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_end_write_message(message_len),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_end_write_message(message_len),
        };
        if result.is_err() {
            self.state = NdefState::Invalid;
        }
        result
    }

    /// Rewrite the tag's message length field (TLV L field, NLEN, Ln).
    pub fn write_raw_message_len(&mut self, message_len: usize) -> Result<()> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_write_raw_message_len(message_len),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_write_raw_message_len(message_len),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_write_raw_message_len(message_len),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_write_raw_message_len(message_len),
        }
    }

    /// Initialize a blank or wiped tag with a CC and an empty message.
    ///
    /// `cc` overrides the technology defaults; its variant must match the
    /// session's technology.
    pub fn format(&mut self, cc: Option<&CapabilityContainer>, options: FormatOptions) -> Result<()> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_format(cc),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_format(cc),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_format(),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_format(cc, options),
        }
    }

    /// Cheapest possible exchange proving the tag is still in the field.
    pub fn check_presence(&mut self) -> Result<()> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_check_presence(),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_check_presence(),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_check_presence(),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_check_presence(),
        }
    }

    /// Read `buf.len()` bytes of the NDEF area starting at `offset`.
    pub fn read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.driver_read_bytes(offset, buf)
    }

    /// Write `data` into the NDEF area starting at `offset`, preserving
    /// bytes outside the range on partially covered blocks.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.driver_write_bytes(offset, data)
    }

    fn driver_init(&mut self) -> Result<()> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => Ok(()),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => Ok(()),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => Ok(()),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_init(),
        }
    }

    pub(crate) fn driver_read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_read_bytes(offset, buf).map(|()| buf.len()),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_read_bytes(offset, buf).map(|()| buf.len()),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_read_bytes(offset, buf),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_read_bytes(offset, buf).map(|()| buf.len()),
        }
    }

    pub(crate) fn driver_write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        match self.session {
            #[cfg(feature = "t2t")]
            Session::T2t(_) => self.t2t_write_bytes(offset, data),
            #[cfg(feature = "t3t")]
            Session::T3t(_) => self.t3t_write_bytes(offset, data),
            #[cfg(feature = "t4t")]
            Session::T4t(_) => self.t4t_write_bytes(offset, data),
            #[cfg(feature = "t5t")]
            Session::T5t(_) => self.t5t_write_bytes(offset, data),
        }
    }
}
