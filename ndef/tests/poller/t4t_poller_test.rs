#[path = "../common/mod.rs"]
mod common;

use ndef_poller::prelude::*;
use ndef_poller::test_support::T4tTagSim;

fn context(sim: T4tTagSim) -> NdefContext {
    let device = sim.device();
    NdefContext::new(Box::new(sim), device).unwrap()
}

#[test]
fn chunked_write_then_read_roundtrip() {
    // MLe 59 / MLc 52 force several ReadBinary/UpdateBinary exchanges
    let mut ctx = context(T4tTagSim::formatted(200));
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.area_len, 198);

    let payload = common::fixtures::long_payload(150);
    ctx.write_raw_message(&payload).unwrap();
    assert_eq!(ctx.state(), NdefState::ReadWrite);

    let mut buf = vec![0u8; 150];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, payload);

    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 150);
}

#[test]
fn multi_record_message_roundtrip() {
    let mut msg = Message::new();
    msg.push(Record::text_record("en", "first").unwrap());
    msg.push(Record::text_record("en", "second").unwrap());

    let mut ctx = context(T4tTagSim::formatted(64));
    ctx.detect().unwrap();
    ctx.write_message(&msg).unwrap();

    let mut buf = vec![0u8; ctx.message_len()];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, msg.to_bytes());
}

#[test]
fn mapping_v3_uses_enlen() {
    let mut ctx = context(T4tTagSim::formatted_v3(64));
    let info = ctx.detect().unwrap();
    assert_eq!(info.version.major, 3);
    // 4-byte ENLEN leaves 60 payload bytes
    assert_eq!(info.area_len, 60);

    ctx.write_raw_message(&common::fixtures::text_message_bytes())
        .unwrap();
    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 9);
    let mut buf = vec![0u8; 9];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, common::fixtures::text_message_bytes());
}

#[test]
fn oversized_message_is_refused_up_front() {
    let mut ctx = context(T4tTagSim::formatted(64));
    ctx.detect().unwrap();
    assert!(matches!(
        ctx.write_raw_message(&common::fixtures::long_payload(70)),
        Err(Error::OutOfMemory {
            needed: 70,
            available: 62
        })
    ));
    // the session survives a refused write
    assert_eq!(ctx.state(), NdefState::Initialized);
    ctx.write_raw_message(&common::fixtures::long_payload(62))
        .unwrap();
}

#[test]
fn v1_only_application_still_detects() {
    let mut sim = T4tTagSim::with_message(64, &common::fixtures::text_message_bytes());
    sim.only_v1_application();
    let mut ctx = context(sim);
    let info = ctx.detect().unwrap();
    assert_eq!(info.message_len, 9);
}

#[test]
fn format_is_not_supported() {
    let mut ctx = context(T4tTagSim::formatted(64));
    ctx.detect().unwrap();
    assert!(matches!(
        ctx.format(None, FormatOptions::default()),
        Err(Error::NotSupported(TagType::Type4))
    ));
}
