// ndef-poller/ndef/src/transceiver.rs

//! Radio-side collaborator interface.
//!
//! The pollers never talk to a chip directly; everything goes through the
//! [`Transceiver`] trait. Every method has a default body answering
//! `Unsupported` so an implementation only provides the technologies its
//! radio stack actually offers, in the same way a transport may lack
//! vendor-specific control transfers.

use crate::types::{BlockData, ServiceCode, TagType, Uid};
use crate::{Result, TransceiveError};

/// Listen technology reported by the discovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenTech {
    /// NFC-A, refined by the anticollision outcome.
    NfcA(NfcaSubtype),
    /// NFC-B, always ISO-DEP.
    NfcB,
    /// NFC-F (FeliCa).
    NfcF,
    /// NFC-V (vicinity).
    NfcV,
}

/// NFC-A splits further by SEL_RES/anticollision outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcaSubtype {
    /// Topaz family, no SEL_RES.
    Type1,
    /// SEL_RES announced a Type 2 platform.
    Type2,
    /// SEL_RES announced ISO-DEP support.
    IsoDep,
}

/// Handle produced by poll/select at the radio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Technology the device was found on.
    pub tech: ListenTech,
    /// Identifier captured during discovery.
    pub uid: Uid,
}

impl DiscoveredDevice {
    /// Tag technology the NDEF layer must drive for this device.
    pub fn tag_type(&self) -> TagType {
        match self.tech {
            ListenTech::NfcA(NfcaSubtype::Type1) => TagType::Type1,
            ListenTech::NfcA(NfcaSubtype::Type2) => TagType::Type2,
            ListenTech::NfcA(NfcaSubtype::IsoDep) | ListenTech::NfcB => TagType::Type4,
            ListenTech::NfcF => TagType::Type3,
            ListenTech::NfcV => TagType::Type5,
        }
    }
}

fn unsupported<T>() -> Result<T> {
    Err(TransceiveError::Unsupported.into())
}

/// Synchronous tag exchange primitives, one family per technology.
///
/// Block reads return the raw response payload; for NFC-V this includes the
/// leading response-flags byte, which the poller checks itself.
pub trait Transceiver {
    // NFC-A / Type 2

    /// Switch to `sector` for tags larger than one sector.
    fn t2t_sector_select(&mut self, _sector: u8) -> Result<()> {
        unsupported()
    }

    /// Read 16 bytes starting at `block` in the current sector.
    fn t2t_read_block(&mut self, _block: u8) -> Result<Vec<u8>> {
        unsupported()
    }

    /// Write one 4-byte block in the current sector.
    fn t2t_write_block(&mut self, _block: u8, _data: &[u8; 4]) -> Result<()> {
        unsupported()
    }

    // NFC-F / Type 3

    /// Check (read) the listed 16-byte blocks of one service.
    fn t3t_check(&mut self, _service: ServiceCode, _blocks: &[u16]) -> Result<Vec<BlockData>> {
        unsupported()
    }

    /// Update (write) the listed 16-byte blocks of one service.
    fn t3t_update(&mut self, _service: ServiceCode, _blocks: &[(u16, BlockData)]) -> Result<()> {
        unsupported()
    }

    // ISO-DEP / Type 4

    /// Exchange one C-APDU, returning the full R-APDU including SW1/SW2.
    fn transceive_apdu(&mut self, _capdu: &[u8]) -> Result<Vec<u8>> {
        unsupported()
    }

    // NFC-V / Type 5

    /// Put the tag with `uid` into the Selected state.
    fn t5t_select(&mut self, _uid: &Uid) -> Result<()> {
        unsupported()
    }

    /// ReadSingleBlock. Response is `flags || data`.
    fn t5t_read_single_block(&mut self, _block: u16, _two_byte_addr: bool) -> Result<Vec<u8>> {
        unsupported()
    }

    /// ReadMultipleBlocks of `count + 1` blocks. Response is `flags || data`.
    fn t5t_read_multiple_blocks(
        &mut self,
        _first_block: u16,
        _count: u8,
        _two_byte_addr: bool,
    ) -> Result<Vec<u8>> {
        unsupported()
    }

    /// WriteSingleBlock, optionally using the special frame format.
    fn t5t_write_single_block(
        &mut self,
        _block: u16,
        _two_byte_addr: bool,
        _special_frame: bool,
        _data: &[u8],
    ) -> Result<()> {
        unsupported()
    }

    /// (Extended) GetSystemInformation. Response is `flags || info`.
    fn t5t_system_information(&mut self, _extended: bool) -> Result<Vec<u8>> {
        unsupported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::convert::TryFrom;

    struct Radioless;
    impl Transceiver for Radioless {}

    #[test]
    fn defaults_answer_unsupported() {
        let mut t = Radioless;
        assert!(matches!(
            t.t2t_read_block(0),
            Err(Error::Transceive(TransceiveError::Unsupported))
        ));
        assert!(matches!(
            t.transceive_apdu(&[0x00, 0xA4, 0x04, 0x00]),
            Err(Error::Transceive(TransceiveError::Unsupported))
        ));
    }

    #[test]
    fn device_type_mapping() {
        let uid = Uid::try_from([0x01, 0x02, 0x03, 0x04].as_slice()).unwrap();
        let cases = [
            (ListenTech::NfcA(NfcaSubtype::Type1), TagType::Type1),
            (ListenTech::NfcA(NfcaSubtype::Type2), TagType::Type2),
            (ListenTech::NfcA(NfcaSubtype::IsoDep), TagType::Type4),
            (ListenTech::NfcB, TagType::Type4),
            (ListenTech::NfcF, TagType::Type3),
            (ListenTech::NfcV, TagType::Type5),
        ];
        for (tech, expected) in cases {
            let dev = DiscoveredDevice { tech, uid };
            assert_eq!(dev.tag_type(), expected);
        }
    }
}
