#[path = "../common/mod.rs"]
mod common;

use std::convert::TryFrom;

use ndef_poller::prelude::*;
use ndef_poller::test_support::T2tTagSim;

fn context(sim: T2tTagSim) -> NdefContext {
    let device = sim.device();
    NdefContext::new(Box::new(sim), device).unwrap()
}

#[test]
fn operations_need_a_successful_detection_first() {
    let mut ctx = context(T2tTagSim::with_area(48));
    let mut buf = [0u8; 8];
    assert!(matches!(
        ctx.read_raw_message(&mut buf),
        Err(Error::WrongState {
            state: NdefState::Invalid
        })
    ));
    assert!(matches!(
        ctx.write_raw_message(&buf),
        Err(Error::WrongState { .. })
    ));
    assert!(matches!(
        ctx.check_available_space(8),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn initialized_tag_has_nothing_to_read() {
    let mut ctx = context(T2tTagSim::with_area(48));
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    let mut buf = [0u8; 8];
    assert!(matches!(
        ctx.read_raw_message(&mut buf),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn short_read_buffer_is_rejected() {
    let mut ctx = context(T2tTagSim::with_message(48, &common::fixtures::text_message_bytes()));
    ctx.detect().unwrap();
    let mut buf = [0u8; 4];
    assert!(matches!(
        ctx.read_raw_message(&mut buf),
        Err(Error::OutOfMemory {
            needed: 9,
            available: 4
        })
    ));
}

#[test]
fn failed_write_invalidates_the_session() {
    let mut sim = T2tTagSim::with_area(48);
    sim.fail_writes_after(1);
    let mut ctx = context(sim);
    ctx.detect().unwrap();
    assert!(ctx.write_raw_message(&[0u8; 8]).is_err());
    assert_eq!(ctx.state(), NdefState::Invalid);
    let mut buf = [0u8; 8];
    assert!(matches!(
        ctx.read_raw_message(&mut buf),
        Err(Error::WrongState { .. })
    ));
    // a new detection recovers the session
    let info = ctx.detect().unwrap();
    assert!(info.state.is_valid());
}

#[test]
fn interrupted_write_sequence_reads_back_empty() {
    let mut ctx = context(T2tTagSim::with_area(144));
    ctx.detect().unwrap();
    let payload = common::fixtures::text_message_bytes();
    ctx.begin_write_message(payload.len()).unwrap();
    ctx.write_bytes(16 + 2, &payload).unwrap();
    // without end_write_message the length field still says zero
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.message_len, 0);
}

#[test]
fn type_1_has_no_driver() {
    let sim = T2tTagSim::blank(48);
    let device = DiscoveredDevice {
        tech: ListenTech::NfcA(NfcaSubtype::Type1),
        uid: Uid::try_from([0x04u8, 0x01, 0x02, 0x03].as_slice()).unwrap(),
    };
    assert!(matches!(
        NdefContext::new(Box::new(sim), device),
        Err(Error::NotSupported(TagType::Type1))
    ));
}

#[test]
fn check_presence_works_in_any_state() {
    let mut ctx = context(T2tTagSim::blank(48));
    ctx.check_presence().unwrap();
    assert!(ctx.detect().is_err());
    ctx.check_presence().unwrap();
}
