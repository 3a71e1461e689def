#[path = "../common/mod.rs"]
mod common;

use ndef_poller::message::{Message, Record, TNF_EXTERNAL};

#[test]
fn known_text_record_wire_form() {
    let msg = common::fixtures::text_message();
    assert_eq!(msg.to_bytes(), common::fixtures::text_message_bytes());
}

#[test]
fn three_record_message_flags() {
    let mut msg = Message::new();
    msg.push(Record::text_record("en", "a").unwrap());
    msg.push(Record::new(TNF_EXTERNAL, b"ex:t", b"id", b"x").unwrap());
    msg.push(Record::text_record("de", "b").unwrap());
    let bytes = msg.to_bytes();
    assert_eq!(bytes.len(), msg.encoded_len());

    let first = bytes[0];
    let second = bytes[msg.records()[0].encoded_len()];
    let third = bytes[msg.records()[0].encoded_len() + msg.records()[1].encoded_len()];
    assert_eq!(first & 0xC0, 0x80); // MB only
    assert_eq!(second & 0xC0, 0x00); // middle
    assert_eq!(third & 0xC0, 0x40); // ME only
    assert_ne!(second & 0x08, 0); // IL on the record with an id
}

#[test]
fn long_payload_clears_the_short_record_flag() {
    let msg = common::fixtures::long_media_message(300);
    let bytes = msg.to_bytes();
    assert_eq!(bytes[0] & 0x10, 0);
    assert_eq!(&bytes[2..6], &300u32.to_be_bytes());
    // type follows the 4-byte payload length
    assert_eq!(&bytes[6..30], b"application/octet-stream");
}

#[test]
fn oversized_type_and_id_are_rejected() {
    let long = vec![0x41u8; 256];
    assert!(Record::new(1, &long, &[], &[]).is_err());
    assert!(Record::new(1, b"T", &long, &[]).is_err());
}
