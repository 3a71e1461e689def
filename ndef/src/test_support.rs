// ndef-poller/ndef/src/test_support.rs

//! In-memory tag simulators.
//!
//! One simulator per technology, each implementing [`Transceiver`] over a
//! plain byte buffer. They answer like a well-behaved product of their
//! family and offer a few switches (write failure injection, special frame
//! requirement, v1-only application) for exercising the error paths.
//! Integration tests, examples and benches all drive the pollers through
//! these.

use std::convert::TryFrom;

use crate::transceiver::{DiscoveredDevice, ListenTech, NfcaSubtype, Transceiver};
use crate::types::{BlockData, ServiceCode, Uid};
use crate::{Result, TransceiveError};

#[cfg(feature = "t3t")]
use crate::cc::t3t::AttributeBlock;

fn uid(bytes: &[u8]) -> Uid {
    Uid::try_from(bytes).unwrap_or_else(|_| {
        // constructor inputs are fixed in this module
        unreachable!()
    })
}

// ---------------------------------------------------------------------------
// Type 2

/// Simulated Type 2 tag over a flat byte buffer.
#[cfg(feature = "t2t")]
pub struct T2tTagSim {
    memory: Vec<u8>,
    current_sector: usize,
    reads: usize,
    writes: usize,
    fail_reads_after: Option<usize>,
    fail_writes_after: Option<usize>,
}

#[cfg(feature = "t2t")]
impl T2tTagSim {
    /// Tag with an all-zero memory of `area_len` data bytes.
    pub fn blank(area_len: usize) -> Self {
        Self {
            memory: vec![0; 16 + area_len],
            current_sector: 0,
            reads: 0,
            writes: 0,
            fail_reads_after: None,
            fail_writes_after: None,
        }
    }

    /// Formatted tag: CC plus an empty message TLV.
    pub fn with_area(area_len: usize) -> Self {
        let mut sim = Self::blank(area_len);
        sim.memory[12..16].copy_from_slice(&[0xE1, 0x10, (area_len / 8) as u8, 0x00]);
        sim.memory[16..20].copy_from_slice(&[0x03, 0x00, 0xFE, 0x00]);
        sim
    }

    /// Formatted tag carrying `message`.
    pub fn with_message(area_len: usize, message: &[u8]) -> Self {
        let mut sim = Self::with_area(area_len);
        assert!(message.len() <= 254, "use a multi-byte length by hand");
        sim.memory[17] = message.len() as u8;
        sim.memory[18..18 + message.len()].copy_from_slice(message);
        sim.memory[18 + message.len()] = 0xFE;
        sim
    }

    /// Overwrite raw tag memory starting at `offset`.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Let `n` block reads succeed, then time out on every further one, as
    /// a tag leaving the field would.
    pub fn fail_reads_after(&mut self, n: usize) {
        self.fail_reads_after = Some(n);
    }

    /// Let `n` block writes succeed, then time out on every further one.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.fail_writes_after = Some(n);
    }

    /// Raw tag memory.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Discovery handle matching this simulator.
    pub fn device(&self) -> DiscoveredDevice {
        DiscoveredDevice {
            tech: ListenTech::NfcA(NfcaSubtype::Type2),
            uid: uid(&[0x04, 0xD6, 0x94, 0x32, 0xAA, 0xBB, 0xCC]),
        }
    }
}

#[cfg(feature = "t2t")]
impl Transceiver for T2tTagSim {
    fn t2t_sector_select(&mut self, sector: u8) -> Result<()> {
        self.current_sector = sector as usize;
        Ok(())
    }

    fn t2t_read_block(&mut self, block: u8) -> Result<Vec<u8>> {
        if let Some(limit) = self.fail_reads_after {
            if self.reads >= limit {
                return Err(TransceiveError::Timeout.into());
            }
        }
        self.reads += 1;
        let base = self.current_sector * 1024 + block as usize * 4;
        let mut out = vec![0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.memory.get(base + i).copied().unwrap_or(0);
        }
        Ok(out)
    }

    fn t2t_write_block(&mut self, block: u8, data: &[u8; 4]) -> Result<()> {
        if let Some(limit) = self.fail_writes_after {
            if self.writes >= limit {
                return Err(TransceiveError::Timeout.into());
            }
        }
        self.writes += 1;
        let base = self.current_sector * 1024 + block as usize * 4;
        if base + 4 > self.memory.len() {
            return Err(TransceiveError::Status(0x00).into());
        }
        self.memory[base..base + 4].copy_from_slice(data);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Type 3

/// Simulated Type 3 tag as an array of 16-byte blocks.
#[cfg(feature = "t3t")]
pub struct T3tTagSim {
    /// Block 0 is the attribute block, data blocks follow.
    blocks: Vec<[u8; 16]>,
}

#[cfg(feature = "t3t")]
impl T3tTagSim {
    /// Formatted tag with `nmaxb` data blocks and an empty message.
    pub fn formatted(nmaxb: u16) -> Self {
        Self::with_attribute(&AttributeBlock {
            version: crate::types::Version::V1_0,
            nbr: 4,
            nbw: 1,
            nmaxb,
            write_flag: 0x00,
            rw_flag: 0x01,
            ln: 0,
        })
    }

    /// Tag whose block 0 carries exactly `aib`.
    pub fn with_attribute(aib: &AttributeBlock) -> Self {
        let mut blocks = vec![[0u8; 16]; 1 + aib.nmaxb as usize];
        blocks[0] = aib.to_bytes();
        Self { blocks }
    }

    /// Formatted tag carrying `message`.
    pub fn with_message(nmaxb: u16, message: &[u8]) -> Self {
        let aib = AttributeBlock {
            version: crate::types::Version::V1_0,
            nbr: 4,
            nbw: 1,
            nmaxb,
            write_flag: 0x00,
            rw_flag: 0x01,
            ln: message.len() as u32,
        };
        let mut sim = Self::with_attribute(&aib);
        for (i, &byte) in message.iter().enumerate() {
            sim.blocks[1 + i / 16][i % 16] = byte;
        }
        sim
    }

    /// Break the stored attribute block checksum.
    pub fn corrupt_attribute_checksum(&mut self) {
        self.blocks[0][14] ^= 0xFF;
    }

    /// Discovery handle matching this simulator.
    pub fn device(&self) -> DiscoveredDevice {
        DiscoveredDevice {
            tech: ListenTech::NfcF,
            uid: uid(&[0x01, 0x27, 0x00, 0x5A, 0x12, 0x34, 0x56, 0x78]),
        }
    }
}

#[cfg(feature = "t3t")]
impl Transceiver for T3tTagSim {
    fn t3t_check(&mut self, service: ServiceCode, blocks: &[u16]) -> Result<Vec<BlockData>> {
        if service != ServiceCode::NDEF_READ {
            return Err(TransceiveError::Status(0xA1).into());
        }
        blocks
            .iter()
            .map(|&n| {
                self.blocks
                    .get(n as usize)
                    .map(|b| BlockData::from_bytes(*b))
                    .ok_or_else(|| TransceiveError::Status(0xA2).into())
            })
            .collect()
    }

    fn t3t_update(&mut self, service: ServiceCode, blocks: &[(u16, BlockData)]) -> Result<()> {
        if service != ServiceCode::NDEF_WRITE {
            return Err(TransceiveError::Status(0xA1).into());
        }
        for &(n, data) in blocks {
            let slot = self
                .blocks
                .get_mut(n as usize)
                .ok_or(TransceiveError::Status(0xA2))?;
            *slot = *data.as_bytes();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Type 4

#[cfg(feature = "t4t")]
#[derive(PartialEq)]
enum T4tSelected {
    None,
    Cc,
    Ndef,
}

/// Simulated Type 4 tag answering the NDEF application APDUs.
#[cfg(feature = "t4t")]
pub struct T4tTagSim {
    cc_file: Vec<u8>,
    ndef_file: Vec<u8>,
    selected: T4tSelected,
    v1_only: bool,
}

#[cfg(feature = "t4t")]
impl T4tTagSim {
    /// Tag with a mapping 2.0 CC and an empty NDEF file of `file_size`
    /// bytes.
    pub fn formatted(file_size: u16) -> Self {
        let mut cc_file = vec![0x00, 0x0F, 0x20, 0x00, 0x3B, 0x00, 0x34, 0x04, 0x06, 0xE1, 0x04];
        cc_file.extend_from_slice(&file_size.to_be_bytes());
        cc_file.extend_from_slice(&[0x00, 0x00]);
        Self {
            cc_file,
            ndef_file: vec![0; file_size as usize],
            selected: T4tSelected::None,
            v1_only: false,
        }
    }

    /// Tag with a mapping 3.0 CC (ENLEN, 06h file control TLV) and an empty
    /// NDEF file of `file_size` bytes.
    pub fn formatted_v3(file_size: u32) -> Self {
        let mut cc_file = vec![0x00, 0x11, 0x30, 0x00, 0x3B, 0x00, 0x34, 0x06, 0x08, 0xE1, 0x04];
        cc_file.extend_from_slice(&file_size.to_be_bytes());
        cc_file.extend_from_slice(&[0x00, 0x00]);
        Self {
            cc_file,
            ndef_file: vec![0; file_size as usize],
            selected: T4tSelected::None,
            v1_only: false,
        }
    }

    /// Formatted tag carrying `message`.
    pub fn with_message(file_size: u16, message: &[u8]) -> Self {
        let mut sim = Self::formatted(file_size);
        sim.ndef_file[..2].copy_from_slice(&(message.len() as u16).to_be_bytes());
        sim.ndef_file[2..2 + message.len()].copy_from_slice(message);
        sim
    }

    /// Only answer the mapping version 1.0 application select.
    pub fn only_v1_application(&mut self) {
        self.v1_only = true;
    }

    /// Flip the CC write-access byte to locked.
    pub fn write_protect(&mut self) {
        let last = self.cc_file.len() - 1;
        self.cc_file[last] = 0xFF;
    }

    /// Raw NDEF file contents, length field included.
    pub fn ndef_file(&self) -> &[u8] {
        &self.ndef_file
    }

    /// Discovery handle matching this simulator.
    pub fn device(&self) -> DiscoveredDevice {
        DiscoveredDevice {
            tech: ListenTech::NfcA(NfcaSubtype::IsoDep),
            uid: uid(&[0x08, 0x7A, 0xBC, 0xDE]),
        }
    }

    fn selected_file(&mut self) -> Option<&mut Vec<u8>> {
        match self.selected {
            T4tSelected::Cc => Some(&mut self.cc_file),
            T4tSelected::Ndef => Some(&mut self.ndef_file),
            T4tSelected::None => None,
        }
    }
}

#[cfg(feature = "t4t")]
impl Transceiver for T4tTagSim {
    fn transceive_apdu(&mut self, capdu: &[u8]) -> Result<Vec<u8>> {
        let sw = |sw1: u8, sw2: u8| Ok(vec![sw1, sw2]);
        match capdu {
            // select application by AID
            [0x00, 0xA4, 0x04, 0x00, 0x07, aid @ .., 0x00] => {
                let v2 = aid == [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
                let v1 = aid == [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x00];
                if (v2 && !self.v1_only) || v1 {
                    self.selected = T4tSelected::None;
                    sw(0x90, 0x00)
                } else {
                    sw(0x6A, 0x82)
                }
            }
            // select file by id
            [0x00, 0xA4, 0x00, 0x0C, 0x02, f0, f1] => match [*f0, *f1] {
                [0xE1, 0x03] => {
                    self.selected = T4tSelected::Cc;
                    sw(0x90, 0x00)
                }
                [0xE1, 0x04] => {
                    self.selected = T4tSelected::Ndef;
                    sw(0x90, 0x00)
                }
                _ => sw(0x6A, 0x82),
            },
            // read binary
            [0x00, 0xB0, hi, lo, le] => {
                let offset = u16::from_be_bytes([*hi, *lo]) as usize;
                let le = if *le == 0 { 256 } else { *le as usize };
                let Some(file) = self.selected_file() else {
                    return sw(0x69, 0x86);
                };
                if offset > file.len() {
                    return sw(0x6A, 0x86);
                }
                let end = (offset + le).min(file.len());
                let mut resp = file[offset..end].to_vec();
                resp.extend_from_slice(&[0x90, 0x00]);
                Ok(resp)
            }
            // update binary
            [0x00, 0xD6, hi, lo, lc, data @ ..] => {
                let offset = u16::from_be_bytes([*hi, *lo]) as usize;
                if data.len() != *lc as usize {
                    return sw(0x67, 0x00);
                }
                let Some(file) = self.selected_file() else {
                    return sw(0x69, 0x86);
                };
                if offset + data.len() > file.len() {
                    return sw(0x6A, 0x84);
                }
                file[offset..offset + data.len()].copy_from_slice(data);
                sw(0x90, 0x00)
            }
            _ => sw(0x6D, 0x00),
        }
    }
}

// ---------------------------------------------------------------------------
// Type 5

/// Simulated Type 5 tag with a configurable block length.
#[cfg(feature = "t5t")]
pub struct T5tTagSim {
    memory: Vec<u8>,
    block_len: usize,
    require_special_frame: bool,
    uid: [u8; 8],
}

#[cfg(feature = "t5t")]
impl T5tTagSim {
    /// Blank tag of `num_blocks` blocks of `block_len` bytes.
    pub fn blank(num_blocks: usize, block_len: usize) -> Self {
        Self {
            memory: vec![0; num_blocks * block_len],
            block_len,
            require_special_frame: false,
            uid: [0xE0, 0x04, 0x01, 0x08, 0x12, 0x34, 0x56, 0x78],
        }
    }

    /// Formatted tag of `mem_bytes` bytes: 4-byte CC plus an empty message.
    pub fn formatted(mem_bytes: usize, block_len: usize) -> Self {
        let mut sim = Self::blank(mem_bytes / block_len, block_len);
        sim.memory[..4].copy_from_slice(&[0xE1, 0x40, (mem_bytes / 8) as u8, 0x00]);
        sim.memory[4..8].copy_from_slice(&[0x03, 0x00, 0xFE, 0x00]);
        sim
    }

    /// Formatted tag (4-byte blocks) carrying `message`.
    pub fn with_message(mem_bytes: usize, message: &[u8]) -> Self {
        let mut sim = Self::formatted(mem_bytes, 4);
        assert!(message.len() <= 254, "use a multi-byte length by hand");
        sim.memory[5] = message.len() as u8;
        sim.memory[6..6 + message.len()].copy_from_slice(message);
        sim.memory[6 + message.len()] = 0xFE;
        sim
    }

    /// Overwrite raw tag memory starting at `offset`.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Refuse writes that do not use the special frame format.
    pub fn require_special_frame(&mut self) {
        self.require_special_frame = true;
    }

    /// Flip the CC access bits to read-only.
    pub fn write_protect(&mut self) {
        self.memory[1] |= 0x03;
    }

    /// Raw tag memory.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Discovery handle matching this simulator.
    pub fn device(&self) -> DiscoveredDevice {
        DiscoveredDevice {
            tech: ListenTech::NfcV,
            uid: uid(&self.uid),
        }
    }

    fn block_range(&self, block: u16) -> Result<std::ops::Range<usize>> {
        let start = block as usize * self.block_len;
        let end = start + self.block_len;
        if end > self.memory.len() {
            // error flag with the "block not available" code
            return Err(TransceiveError::Status(0x0F).into());
        }
        Ok(start..end)
    }
}

#[cfg(feature = "t5t")]
impl Transceiver for T5tTagSim {
    fn t5t_select(&mut self, target: &Uid) -> Result<()> {
        if target.as_bytes() == self.uid {
            Ok(())
        } else {
            Err(TransceiveError::Timeout.into())
        }
    }

    fn t5t_read_single_block(&mut self, block: u16, _two_byte_addr: bool) -> Result<Vec<u8>> {
        let range = self.block_range(block)?;
        let mut resp = vec![0x00];
        resp.extend_from_slice(&self.memory[range]);
        Ok(resp)
    }

    fn t5t_read_multiple_blocks(
        &mut self,
        first_block: u16,
        count: u8,
        _two_byte_addr: bool,
    ) -> Result<Vec<u8>> {
        let mut resp = vec![0x00];
        for block in first_block..=first_block + count as u16 {
            let range = self.block_range(block)?;
            resp.extend_from_slice(&self.memory[range]);
        }
        Ok(resp)
    }

    fn t5t_write_single_block(
        &mut self,
        block: u16,
        _two_byte_addr: bool,
        special_frame: bool,
        data: &[u8],
    ) -> Result<()> {
        if self.require_special_frame && !special_frame {
            return Err(TransceiveError::Status(0x13).into());
        }
        if data.len() != self.block_len {
            return Err(TransceiveError::Status(0x0F).into());
        }
        let range = self.block_range(block)?;
        self.memory[range].copy_from_slice(data);
        Ok(())
    }

    fn t5t_system_information(&mut self, extended: bool) -> Result<Vec<u8>> {
        let num_blocks = self.memory.len() / self.block_len;
        let mut resp = vec![0x00, INFO_MEM_SIZE_FLAG];
        resp.extend_from_slice(&self.uid);
        if extended {
            resp.extend_from_slice(&((num_blocks - 1) as u16).to_le_bytes());
        } else {
            if num_blocks > 256 {
                return Err(TransceiveError::Status(0x0F).into());
            }
            resp.push((num_blocks - 1) as u8);
        }
        resp.push((self.block_len - 1) as u8);
        Ok(resp)
    }
}

#[cfg(feature = "t5t")]
const INFO_MEM_SIZE_FLAG: u8 = 0x04;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "t2t")]
    #[test]
    fn t2t_sim_read_covers_16_bytes() {
        let mut sim = T2tTagSim::with_area(48);
        let block3 = sim.t2t_read_block(3).unwrap();
        assert_eq!(&block3[..4], &[0xE1, 0x10, 0x06, 0x00]);
        assert_eq!(&block3[4..8], &[0x03, 0x00, 0xFE, 0x00]);
    }

    #[cfg(feature = "t4t")]
    #[test]
    fn t4t_sim_rejects_unknown_file() {
        let mut sim = T4tTagSim::formatted(64);
        let resp = sim
            .transceive_apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0xE1, 0x05])
            .unwrap();
        assert_eq!(resp, vec![0x6A, 0x82]);
    }

    #[cfg(feature = "t5t")]
    #[test]
    fn t5t_sim_answers_system_information() {
        let mut sim = T5tTagSim::blank(16, 4);
        let resp = sim.t5t_system_information(false).unwrap();
        assert_eq!(resp[0], 0x00);
        assert_eq!(resp[resp.len() - 2], 15); // block count - 1
        assert_eq!(resp[resp.len() - 1], 3); // block length - 1
    }
}
