#[path = "../common/mod.rs"]
mod common;

use ndef_poller::prelude::*;
use ndef_poller::test_support::T5tTagSim;

fn context(sim: T5tTagSim) -> NdefContext {
    let device = sim.device();
    NdefContext::new(Box::new(sim), device).unwrap()
}

#[test]
fn write_then_read_roundtrip_on_8_byte_blocks() {
    let mut ctx = context(T5tTagSim::formatted(128, 8));
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);

    ctx.write_message(&common::fixtures::text_message()).unwrap();
    let mut buf = vec![0u8; ctx.message_len()];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, common::fixtures::text_message_bytes());

    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::ReadWrite);
    assert_eq!(info.message_len, buf.len());
}

#[test]
fn formatted_large_tag_carries_a_long_message() {
    let mut ctx = context(T5tTagSim::blank(256, 16));
    ctx.format(None, FormatOptions::NfcForum).unwrap();

    let payload = common::fixtures::long_payload(300);
    ctx.write_raw_message(&payload).unwrap();

    // 8-byte CC, then 03 FF 01 2C
    let mut header = [0u8; 4];
    ctx.read_bytes(8, &mut header).unwrap();
    assert_eq!(header, [0x03, 0xFF, 0x01, 0x2C]);
    // terminator right after the payload
    let mut terminator = [0u8];
    ctx.read_bytes(8 + 4 + 300, &mut terminator).unwrap();
    assert_eq!(terminator[0], 0xFE);

    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 300);
    let mut buf = vec![0u8; 300];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn proprietary_tlv_before_the_message_is_skipped() {
    let mut sim = T5tTagSim::formatted(64, 4);
    sim.patch(4, &[0xFD, 0x02, 0xAA, 0xBB, 0x03, 0x02, 0x11, 0x22, 0xFE]);
    let mut ctx = context(sim);
    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 2);
    let mut buf = [0u8; 2];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, [0x11, 0x22]);
}

#[test]
fn terminator_without_message_fails_detection() {
    let mut sim = T5tTagSim::formatted(64, 4);
    sim.patch(4, &[0xFE, 0x00, 0x00, 0x00]);
    let mut ctx = context(sim);
    assert!(matches!(ctx.detect(), Err(Error::Request(_))));
    assert_eq!(ctx.state(), NdefState::Invalid);
}

#[test]
fn interrupted_write_reads_back_empty() {
    let mut ctx = context(T5tTagSim::formatted(64, 4));
    ctx.detect().unwrap();
    let payload = common::fixtures::text_message_bytes();
    ctx.begin_write_message(payload.len()).unwrap();
    let offset = 4 + 2; // cc, then T and L
    ctx.write_bytes(offset, &payload).unwrap();
    // the length field still says zero until the write is ended
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.message_len, 0);
}
