#[path = "../common/mod.rs"]
mod common;

use ndef_poller::cc::t3t::{AttributeBlock, RW_FLAG_READ_ONLY, WRITE_FLAG_OFF};
use ndef_poller::prelude::*;
use ndef_poller::test_support::T3tTagSim;

fn context(sim: T3tTagSim) -> NdefContext {
    let device = sim.device();
    NdefContext::new(Box::new(sim), device).unwrap()
}

#[test]
fn write_then_read_roundtrip() {
    let mut ctx = context(T3tTagSim::formatted(13));
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.area_len, 13 * 16);

    ctx.write_message(&common::fixtures::text_message()).unwrap();
    let mut buf = vec![0u8; ctx.message_len()];
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, common::fixtures::text_message_bytes());

    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::ReadWrite);
    assert_eq!(info.message_len, buf.len());
}

#[test]
fn block_unaligned_message_length() {
    let mut ctx = context(T3tTagSim::formatted(13));
    ctx.detect().unwrap();
    // 50 bytes cover three blocks with a 2-byte tail
    let payload = common::fixtures::long_payload(50);
    ctx.write_raw_message(&payload).unwrap();
    let mut buf = vec![0u8; 50];
    ctx.detect().unwrap();
    ctx.read_raw_message(&mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn read_only_attribute_block() {
    let aib = AttributeBlock {
        version: Version::V1_0,
        nbr: 4,
        nbw: 1,
        nmaxb: 13,
        write_flag: WRITE_FLAG_OFF,
        rw_flag: RW_FLAG_READ_ONLY,
        ln: 9,
    };
    let mut ctx = context(T3tTagSim::with_attribute(&aib));
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::ReadOnly);
    assert!(matches!(
        ctx.write_raw_message(&[0u8; 4]),
        Err(Error::WrongState { .. })
    ));
}

#[test]
fn format_requires_an_attribute_block() {
    let mut ctx = context(T3tTagSim::formatted(13));
    assert!(matches!(
        ctx.format(None, FormatOptions::default()),
        Err(Error::InvalidArgument(_))
    ));

    let aib = AttributeBlock {
        version: Version::V1_0,
        nbr: 8,
        nbw: 2,
        nmaxb: 13,
        write_flag: 0x0F, // cleared by the format
        rw_flag: 0x01,
        ln: 42,
    };
    ctx.format(Some(&CapabilityContainer::T3t(aib)), FormatOptions::default())
        .unwrap();
    let info = ctx.detect().unwrap();
    assert_eq!(info.state, NdefState::Initialized);
    assert_eq!(info.message_len, 0);
    let written = match ctx.capability_container() {
        Some(CapabilityContainer::T3t(aib)) => *aib,
        _ => panic!("attribute block expected"),
    };
    assert_eq!(written.nbr, 8);
    assert_eq!(written.write_flag, WRITE_FLAG_OFF);
}
