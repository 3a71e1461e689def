// ndef-poller/ndef/src/poller/t4t.rs

//! Type 4 tag driver (ISO-DEP, file-based access over APDUs).
//!
//! The NDEF application is selected by AID, then the capability container
//! file (E103h) describes the NDEF file: its id, size and the MLe/MLc
//! chunking limits. The message sits in the NDEF file after the NLEN (or
//! ENLEN, mapping 3.0) length field. File offsets beyond 7FFFh switch to
//! the odd-instruction ReadBinary/UpdateBinary variants carrying the offset
//! in a BER-TLV data object.

use log::{debug, trace};

use crate::cc::t4t::{T4tCc, CC_FILE_ID, CC_LEN_V2};
use crate::cc::CapabilityContainer;
use crate::types::{NdefInfo, NdefState, TagType, Version};
use crate::{Error, Result};

use super::{NdefContext, Session};

/// NDEF tag application AID, mapping version 2.0 and later.
const AID_V2: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
/// Mapping version 1.0 AID, tried when the v2 application is absent.
const AID_V1: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x00];

/// Largest file offset the plain ReadBinary/UpdateBinary P1P2 can address.
const PLAIN_OFFSET_MAX: usize = 0x7FFF;
const MAX_LE: usize = 256;
const MAX_LC: usize = 255;

pub(crate) struct T4tSession {
    cur_mle: usize,
    cur_mlc: usize,
    /// Tag only exposes the mapping version 1.0 application.
    mv1: bool,
    file_size: usize,
    nlen_len: usize,
}

impl T4tSession {
    pub(crate) fn new() -> Self {
        Self {
            cur_mle: MAX_LE,
            cur_mlc: MAX_LC,
            mv1: false,
            file_size: 0,
            nlen_len: 2,
        }
    }
}

fn select_application(aid: &[u8]) -> Vec<u8> {
    let mut capdu = vec![0x00, 0xA4, 0x04, 0x00, aid.len() as u8];
    capdu.extend_from_slice(aid);
    capdu.push(0x00);
    capdu
}

fn select_file(file_id: [u8; 2]) -> Vec<u8> {
    vec![0x00, 0xA4, 0x00, 0x0C, 0x02, file_id[0], file_id[1]]
}

fn le_byte(le: usize) -> u8 {
    if le == MAX_LE { 0x00 } else { le as u8 }
}

/// BER length octets for the 53h data object.
fn push_ber_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
}

/// Unwrap a 53h BER-TLV data object as answered by the odd-instruction
/// ReadBinary.
fn parse_ber_data(resp: &[u8]) -> Result<&[u8]> {
    let malformed = || Error::Protocol("malformed 53h data object".to_string());
    if resp.first() != Some(&0x53) {
        return Err(malformed());
    }
    let (len, header) = match resp.get(1) {
        Some(&l) if l < 0x80 => (l as usize, 2),
        Some(&0x81) => (*resp.get(2).ok_or_else(malformed)? as usize, 3),
        Some(&0x82) => {
            if resp.len() < 4 {
                return Err(malformed());
            }
            (u16::from_be_bytes([resp[2], resp[3]]) as usize, 4)
        }
        _ => return Err(malformed()),
    };
    resp.get(header..header + len).ok_or_else(malformed)
}

impl NdefContext {
    /// Exchange one C-APDU and strip the status word, treating anything but
    /// 9000h as an error.
    fn t4t_transceive(&mut self, capdu: &[u8]) -> Result<Vec<u8>> {
        trace!("c-apdu {:02x?}", &capdu[..4.min(capdu.len())]);
        let mut resp = self.transceiver.transceive_apdu(capdu)?;
        if resp.len() < 2 {
            return Err(Error::Protocol(
                "r-apdu shorter than a status word".to_string(),
            ));
        }
        let sw2 = resp.pop().unwrap_or_default();
        let sw1 = resp.pop().unwrap_or_default();
        if (sw1, sw2) != (0x90, 0x00) {
            return Err(Error::StatusWord { sw1, sw2 });
        }
        Ok(resp)
    }

    fn t4t_session(&self) -> Result<&T4tSession> {
        match &self.session {
            Session::T4t(sess) => Ok(sess),
            #[allow(unreachable_patterns)]
            _ => Err(Error::InvalidArgument("session is not type 4")),
        }
    }

    /// Read one chunk of at most MLe bytes from the selected file.
    fn t4t_read_chunk(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        if offset <= PLAIN_OFFSET_MAX {
            let capdu = vec![
                0x00,
                0xB0,
                (offset >> 8) as u8,
                offset as u8,
                le_byte(len),
            ];
            self.t4t_transceive(&capdu)
        } else {
            let mut capdu = vec![0x00, 0xB1, 0x00, 0x00, 0x05, 0x54, 0x03];
            capdu.extend_from_slice(&(offset as u32).to_be_bytes()[1..]);
            capdu.push(le_byte(len));
            let resp = self.t4t_transceive(&capdu)?;
            parse_ber_data(&resp).map(<[u8]>::to_vec)
        }
    }

    /// Write one chunk of at most MLc bytes into the selected file.
    fn t4t_write_chunk(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let capdu = if offset <= PLAIN_OFFSET_MAX {
            let mut capdu = vec![
                0x00,
                0xD6,
                (offset >> 8) as u8,
                offset as u8,
                data.len() as u8,
            ];
            capdu.extend_from_slice(data);
            capdu
        } else {
            let mut body = vec![0x54, 0x03];
            body.extend_from_slice(&(offset as u32).to_be_bytes()[1..]);
            body.push(0x53);
            push_ber_length(&mut body, data.len());
            body.extend_from_slice(data);
            let mut capdu = vec![0x00, 0xD7, 0x00, 0x00, body.len() as u8];
            capdu.append(&mut body);
            capdu
        };
        self.t4t_transceive(&capdu).map(|_| ())
    }

    pub(crate) fn t4t_read_bytes(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let cur_mle = self.t4t_session()?.cur_mle;
        let mut filled = 0;
        while filled < buf.len() {
            let at = offset + filled;
            let want = (buf.len() - filled).min(cur_mle).min(MAX_LE);
            let chunk = self.t4t_read_chunk(at, want)?;
            if chunk.len() != want {
                return Err(Error::Protocol(format!(
                    "read binary answered {} bytes instead of {}",
                    chunk.len(),
                    want
                )));
            }
            buf[filled..filled + want].copy_from_slice(&chunk);
            filled += want;
        }
        Ok(filled)
    }

    pub(crate) fn t4t_write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let cur_mlc = self.t4t_session()?.cur_mlc;
        let mut written = 0;
        while written < data.len() {
            let at = offset + written;
            let mut take = (data.len() - written).min(cur_mlc).min(MAX_LC);
            if at > PLAIN_OFFSET_MAX {
                // The offset and data objects share the single Lc byte.
                take = take.min(MAX_LC - 9);
            }
            self.t4t_write_chunk(at, &data[written..written + take])?;
            written += take;
        }
        Ok(())
    }

    pub(crate) fn t4t_detect(&mut self) -> Result<NdefInfo> {
        let mv1 = match self.t4t_transceive(&select_application(&AID_V2)) {
            Ok(_) => false,
            Err(Error::StatusWord { .. }) => {
                // Older tags only expose the mapping version 1.0 application.
                self.t4t_transceive(&select_application(&AID_V1))?;
                true
            }
            Err(err) => return Err(err),
        };

        self.t4t_transceive(&select_file(CC_FILE_ID))?;
        let mut cc_buf = self.t4t_read_chunk(0, CC_LEN_V2)?;
        if cc_buf.len() < CC_LEN_V2 {
            return Err(Error::Protocol(format!(
                "cc file read answered {} bytes",
                cc_buf.len()
            )));
        }
        if Version::from_byte(cc_buf[2]).major >= 3 {
            cc_buf.extend(self.t4t_read_chunk(CC_LEN_V2, 2)?);
        }
        let cc = T4tCc::from_bytes(&cc_buf)?;
        if cc.mle == 0 || cc.mlc == 0 {
            return Err(Error::Protocol("cc advertises zero mle or mlc".to_string()));
        }
        if !cc.read_granted() {
            return Err(Error::Request("read access denied".to_string()));
        }
        let nlen_len = cc.nlen_len();
        let file_size = cc.file_size as usize;
        if file_size < nlen_len {
            return Err(Error::Protocol(format!(
                "ndef file of {} bytes cannot hold its length field",
                file_size
            )));
        }
        if let Session::T4t(sess) = &mut self.session {
            sess.cur_mle = (cc.mle as usize).min(MAX_LE);
            sess.cur_mlc = (cc.mlc as usize).min(MAX_LC);
            sess.mv1 = mv1;
            sess.file_size = file_size;
            sess.nlen_len = nlen_len;
        }
        self.cc_raw = cc_buf;
        self.cc = Some(CapabilityContainer::T4t(cc));
        self.area_len = file_size - nlen_len;

        self.t4t_transceive(&select_file(cc.file_id))?;
        let mut nlen_buf = vec![0u8; nlen_len];
        self.t4t_read_bytes(0, &mut nlen_buf)?;
        let nlen = nlen_buf
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        if nlen > self.area_len {
            return Err(Error::Protocol(format!(
                "nlen {} exceeds the {}-byte ndef file body",
                nlen, self.area_len
            )));
        }
        self.message_len = nlen;
        self.message_offset = nlen_len;
        if nlen == 0 {
            if !cc.write_granted() {
                // An empty file that can never be filled is useless.
                return Err(Error::Request(
                    "empty ndef file on a write-protected tag".to_string(),
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
            "t4t ndef file {:02x?}: {} of {} bytes, mapping v{} ({:?})",
            cc.file_id,
            nlen,
            self.area_len,
            if mv1 { 1 } else { cc.version.major },
            self.state
        );
        Ok(NdefInfo {
            state: self.state,
            version: cc.version,
            area_len: self.area_len,
            available_len: self.area_len,
            message_len: nlen,
        })
    }

    pub(crate) fn t4t_check_available_space(&self, message_len: usize) -> Result<()> {
        if message_len > self.area_len {
            return Err(Error::OutOfMemory {
                needed: message_len,
                available: self.area_len,
            });
        }
        Ok(())
    }

    pub(crate) fn t4t_begin_write_message(&mut self, _message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        self.t4t_write_raw_message_len(0)?;
        self.message_offset = self.t4t_session()?.nlen_len;
        self.message_len = 0;
        self.state = NdefState::Initialized;
        Ok(())
    }

    pub(crate) fn t4t_end_write_message(&mut self, message_len: usize) -> Result<()> {
        if self.state != NdefState::Initialized {
            return Err(Error::WrongState { state: self.state });
        }
        self.t4t_write_raw_message_len(message_len)?;
        self.message_len = message_len;
        if message_len > 0 {
            self.state = NdefState::ReadWrite;
        }
        Ok(())
    }

    pub(crate) fn t4t_write_raw_message_len(&mut self, message_len: usize) -> Result<()> {
        if !self.state.is_writable() {
            return Err(Error::WrongState { state: self.state });
        }
        if message_len > self.area_len {
            return Err(Error::InvalidArgument("message length exceeds the ndef file"));
        }
        let nlen_len = self.t4t_session()?.nlen_len;
        let bytes = (message_len as u32).to_be_bytes();
        self.t4t_write_bytes(0, &bytes[4 - nlen_len..])
    }

    /// The file layout of a Type 4 tag is fixed by the card issuer; there is
    /// nothing this layer could create.
    pub(crate) fn t4t_format(&mut self) -> Result<()> {
        Err(Error::NotSupported(TagType::Type4))
    }

    /// Any completed exchange proves the tag is still there, whatever the
    /// status word says.
    pub(crate) fn t4t_check_presence(&mut self) -> Result<()> {
        let resp = self.transceiver.transceive_apdu(&[0x00, 0xB0, 0x00, 0x00, 0x01])?;
        if resp.is_empty() {
            return Err(Error::Protocol("empty r-apdu".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::T4tTagSim;

    fn context(sim: T4tTagSim) -> NdefContext {
        let device = sim.device();
        NdefContext::new(Box::new(sim), device).expect("type 4 driver available")
    }

    #[test]
    fn detect_reads_nlen() {
        let sim = T4tTagSim::with_message(64, &[0xD1, 0x01, 0x05, 0x54, 0x02, b'e', b'n', b'h', b'i']);
        let mut ctx = context(sim);
        let info = ctx.detect().unwrap();
        assert_eq!(info.state, NdefState::ReadWrite);
        assert_eq!(info.area_len, 62);
        assert_eq!(info.message_len, 9);
        let mut buf = [0u8; 9];
        assert_eq!(ctx.read_raw_message(&mut buf).unwrap(), 9);
        assert_eq!(&buf[4..], &[0x02, b'e', b'n', b'h', b'i']);
    }

    #[test]
    fn v1_application_fallback() {
        let mut sim = T4tTagSim::formatted(64);
        sim.only_v1_application();
        let mut ctx = context(sim);
        let info = ctx.detect().unwrap();
        assert_eq!(info.state, NdefState::Initialized);
    }

    #[test]
    fn empty_file_on_write_locked_tag_rejected() {
        let mut sim = T4tTagSim::formatted(64);
        sim.write_protect();
        let mut ctx = context(sim);
        assert!(matches!(ctx.detect(), Err(Error::Request(_))));
        assert_eq!(ctx.state(), NdefState::Invalid);
    }

    #[test]
    fn oversized_write_leaves_file_untouched() {
        let mut ctx = context(T4tTagSim::formatted(64));
        ctx.detect().unwrap();
        let before = ctx.state();
        let err = ctx.write_raw_message(&[0u8; 70]).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfMemory {
                needed: 70,
                available: 62
            }
        ));
        // nothing was written, the session is still usable
        assert_eq!(ctx.state(), before);
        assert_eq!(ctx.message_len(), 0);
    }

    #[test]
    fn write_sets_nlen_last() {
        let mut ctx = context(T4tTagSim::formatted(64));
        ctx.detect().unwrap();
        ctx.write_raw_message(&[0x42; 10]).unwrap();
        assert_eq!(ctx.state(), NdefState::ReadWrite);
        assert_eq!(ctx.message_len(), 10);
        let mut buf = [0u8; 10];
        ctx.read_raw_message(&mut buf).unwrap();
        assert_eq!(buf, [0x42; 10]);
    }

    #[test]
    fn ber_data_object_roundtrip() {
        for len in [0usize, 0x7F, 0x80, 0xFF, 0x100] {
            let mut obj = vec![0x53];
            push_ber_length(&mut obj, len);
            obj.extend(std::iter::repeat(0xA5).take(len));
            assert_eq!(parse_ber_data(&obj).unwrap().len(), len);
        }
        assert!(parse_ber_data(&[0x54, 0x01, 0x00]).is_err());
        assert!(parse_ber_data(&[0x53, 0x05, 0x00]).is_err());
    }
}
