use ndef_poller::tlv;

#[test]
fn length_form_switches_at_255() {
    assert_eq!(tlv::ndef_header(254).unwrap(), hex::decode("03fe").unwrap());
    assert_eq!(
        tlv::ndef_header(255).unwrap(),
        hex::decode("03ff00ff").unwrap()
    );
    assert_eq!(
        tlv::ndef_header(1500).unwrap(),
        hex::decode("03ff05dc").unwrap()
    );
}

#[test]
fn parse_rejects_truncated_long_form() {
    assert!(tlv::parse_length(&hex::decode("ff05").unwrap()).is_err());
}

#[test]
fn every_boundary_length_roundtrips() {
    for len in [0usize, 1, 253, 254, 255, 256, 0xFFFE, 0xFFFF] {
        let mut buf = Vec::new();
        tlv::push_length(&mut buf, len).unwrap();
        let (value, used) = tlv::parse_length(&buf).unwrap();
        assert_eq!(value, len);
        assert_eq!(used, tlv::length_field_len(len));
    }
}

#[test]
fn lengths_past_u16_are_refused() {
    let mut buf = Vec::new();
    assert!(tlv::push_length(&mut buf, 0x1_0000).is_err());
    assert!(buf.is_empty());
}
