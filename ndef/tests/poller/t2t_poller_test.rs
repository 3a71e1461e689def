#[path = "../common/mod.rs"]
mod common;

use std::cell::RefCell;
use std::rc::Rc;

use ndef_poller::prelude::*;
use ndef_poller::test_support::T2tTagSim;

fn context(sim: T2tTagSim) -> NdefContext {
    let device = sim.device();
    NdefContext::new(Box::new(sim), device).unwrap()
}

/// Keeps a second handle on the tag so its backing store can be tampered
/// with while the poller holds the session.
struct SharedTag(Rc<RefCell<T2tTagSim>>);

impl Transceiver for SharedTag {
    fn t2t_sector_select(&mut self, sector: u8) -> Result<()> {
        self.0.borrow_mut().t2t_sector_select(sector)
    }

    fn t2t_read_block(&mut self, block: u8) -> Result<Vec<u8>> {
        self.0.borrow_mut().t2t_read_block(block)
    }

    fn t2t_write_block(&mut self, block: u8, data: &[u8; 4]) -> Result<()> {
        self.0.borrow_mut().t2t_write_block(block, data)
    }
}

#[test]
fn write_then_read_roundtrip() {
    let mut ctx = context(T2tTagSim::with_area(144));
    ctx.detect().unwrap();

    ctx.write_message(&common::fixtures::text_message()).unwrap();
    assert_eq!(ctx.state(), NdefState::ReadWrite);

    let mut buf = vec![0u8; ctx.message_len()];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, common::fixtures::text_message_bytes());

    // a fresh detection sees the same message
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::ReadWrite);
    assert_eq!(info.message_len, buf.len());
}

#[test]
fn long_message_spans_the_sector_boundary() {
    // 255 size units make a 2040-byte area reaching past the first sector
    let mut ctx = context(T2tTagSim::with_area(2040));
    ctx.detect().unwrap();

    let payload = common::fixtures::long_payload(1500);
    ctx.write_raw_message(&payload).unwrap();

    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 1500);
    let mut buf = vec![0u8; 1500];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn empty_write_returns_to_initialized() {
    let mut ctx = context(T2tTagSim::with_message(48, &common::fixtures::text_message_bytes()));
    ctx.detect().unwrap();
    ctx.write_raw_message(&[]).unwrap();
    assert_eq!(ctx.state(), NdefState::Initialized);
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.message_len, 0);
}

#[test]
fn format_blank_tag_writes_default_cc() {
    let mut ctx = context(T2tTagSim::blank(48));
    assert!(ctx.detect().is_err());

    ctx.format(None, FormatOptions::default()).unwrap();
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.area_len, 48);
    assert_eq!(ctx.raw_cc(), &[0xE1, 0x10, 0x06, 0x00]);
}

#[test]
fn read_only_tag_rejects_writes() {
    let mut sim = T2tTagSim::with_message(48, &common::fixtures::text_message_bytes());
    sim.patch(15, &[0x0F]); // write access Fh
    let mut ctx = context(sim);
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::ReadOnly);
    assert!(matches!(
        ctx.write_raw_message(&[0u8; 4]),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn any_write_invalidates_the_block_cache() {
    let tag = Rc::new(RefCell::new(T2tTagSim::with_area(48)));
    let device = tag.borrow().device();
    let mut ctx = NdefContext::new(Box::new(SharedTag(Rc::clone(&tag))), device).unwrap();
    ctx.detect().unwrap();

    let mut before = [0u8; 4];
    ctx.read_bytes(16, &mut before).unwrap();
    assert_eq!(before, [0x03, 0x00, 0xFE, 0x00]);

    // the marker lands behind the cached window's back; only a fresh
    // post-write read can see it
    tag.borrow_mut().patch(18, &[0xC3]);
    ctx.write_bytes(40, &[0x5A]).unwrap();

    let mut after = [0u8; 4];
    ctx.read_bytes(16, &mut after).unwrap();
    assert_eq!(after, [0x03, 0x00, 0xC3, 0x00]);
}

#[test]
fn message_filling_the_area_exactly_fits() {
    let mut ctx = context(T2tTagSim::with_area(48));
    ctx.detect().unwrap();
    // area 48, header 2 bytes: 46 payload bytes leave no terminator room
    let payload = common::fixtures::long_payload(46);
    ctx.write_raw_message(&payload).unwrap();
    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 46);
    assert!(matches!(
        ctx.check_available_space(47),
        Err(Error::OutOfMemory {
            needed: 47,
            available: 46
        })
    ));
}
