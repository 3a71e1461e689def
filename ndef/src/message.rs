// ndef-poller/ndef/src/message.rs

//! Minimal NDEF record/message model.
//!
//! Just enough structure to serialize a message into the raw byte stream the
//! pollers store on a tag: header flags, type, optional id, payload. Typed
//! payload codecs (RTD text, URI and friends) are a layer above this crate;
//! the one `text_record` convenience exists for demos and tests.

use crate::{Error, Result};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;

/// TNF: empty record.
pub const TNF_EMPTY: u8 = 0x00;
/// TNF: NFC Forum well-known type.
pub const TNF_WELL_KNOWN: u8 = 0x01;
/// TNF: media type (RFC 2046).
pub const TNF_MEDIA: u8 = 0x02;
/// TNF: absolute URI.
pub const TNF_ABSOLUTE_URI: u8 = 0x03;
/// TNF: NFC Forum external type.
pub const TNF_EXTERNAL: u8 = 0x04;

/// One NDEF record. Chunked records are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    tnf: u8,
    record_type: Vec<u8>,
    id: Vec<u8>,
    payload: Vec<u8>,
}

impl Record {
    /// Build a record, validating the field length limits.
    pub fn new(tnf: u8, record_type: &[u8], id: &[u8], payload: &[u8]) -> Result<Self> {
        if tnf > 0x07 {
            return Err(Error::InvalidArgument("tnf is a 3-bit field"));
        }
        if record_type.len() > 0xFF {
            return Err(Error::InvalidArgument("record type longer than 255 bytes"));
        }
        if id.len() > 0xFF {
            return Err(Error::InvalidArgument("record id longer than 255 bytes"));
        }
        Ok(Self {
            tnf,
            record_type: record_type.to_vec(),
            id: id.to_vec(),
            payload: payload.to_vec(),
        })
    }

    /// Well-known "T" record: status byte, language code, UTF-8 text.
    pub fn text_record(lang: &str, text: &str) -> Result<Self> {
        if lang.len() > 0x3F {
            return Err(Error::InvalidArgument("language code longer than 63 bytes"));
        }
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        payload.push(lang.len() as u8);
        payload.extend_from_slice(lang.as_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self::new(TNF_WELL_KNOWN, b"T", &[], &payload)
    }

    /// The record payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn short_record(&self) -> bool {
        self.payload.len() <= 0xFF
    }

    /// Encoded size of this record: flags, lengths, type, id, payload.
    pub fn encoded_len(&self) -> usize {
        let payload_len_size = if self.short_record() { 1 } else { 4 };
        let id_len_size = if self.id.is_empty() { 0 } else { 1 };
        2 + payload_len_size + id_len_size + self.record_type.len() + self.id.len()
            + self.payload.len()
    }

    /// Append the wire form of this record, with the given begin/end flags.
    pub fn encode_into(&self, out: &mut Vec<u8>, begin: bool, end: bool) {
        let mut flags = self.tnf;
        if begin {
            flags |= FLAG_MB;
        }
        if end {
            flags |= FLAG_ME;
        }
        if self.short_record() {
            flags |= FLAG_SR;
        }
        if !self.id.is_empty() {
            flags |= FLAG_IL;
        }
        out.push(flags);
        out.push(self.record_type.len() as u8);
        if self.short_record() {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// A sequence of records written as one NDEF message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    records: Vec<Record>,
}

impl Message {
    /// An empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// The records in message order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// True when the message holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total encoded length over all records.
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(Record::encoded_len).sum()
    }

    /// Serialize, setting MB on the first record and ME on the last.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let last = self.records.len().saturating_sub(1);
        for (i, record) in self.records.iter().enumerate() {
            record.encode_into(&mut out, i == 0, i == last);
        }
        out
    }
}

impl From<Record> for Message {
    fn from(record: Record) -> Self {
        Self {
            records: vec![record],
        }
    }
}
