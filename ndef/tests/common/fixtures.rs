// Canned messages shared across the integration suites.

use ndef_poller::message::{Message, Record, TNF_MEDIA};

pub fn text_message() -> Message {
    Record::text_record("en", "hi").expect("valid record").into()
}

/// Wire form of [`text_message`].
pub fn text_message_bytes() -> Vec<u8> {
    hex::decode("d101055402656e6869").expect("valid hex")
}

pub fn long_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i & 0xFF) as u8).collect()
}

/// Single media record whose payload forces the long length forms.
pub fn long_media_message(payload_len: usize) -> Message {
    Record::new(
        TNF_MEDIA,
        b"application/octet-stream",
        &[],
        &long_payload(payload_len),
    )
    .expect("valid record")
    .into()
}
