// Cross-technology capability container vectors taken from real products.

#[cfg(feature = "t2t")]
#[test]
fn ntag216_capability_container() {
    use ndef_poller::cc::t2t::T2tCc;
    let cc = T2tCc::from_bytes([0xE1, 0x10, 0x6D, 0x00]);
    assert_eq!(cc.area_len(), 872);
    assert!(cc.read_granted() && cc.write_granted());
}

#[cfg(feature = "t3t")]
#[test]
fn rc_s965_attribute_block() {
    use ndef_poller::cc::t3t::AttributeBlock;
    let decoded = hex::decode("100401000d000000000001000027004a").unwrap();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&decoded);
    let aib = AttributeBlock::from_bytes(bytes);
    assert_eq!(aib.nbr, 4);
    assert_eq!(aib.nbw, 1);
    assert_eq!(aib.nmaxb, 13);
    assert_eq!(aib.ln, 39);
    assert!(aib.write_granted());
    assert_eq!(AttributeBlock::checksum(&bytes), 0x4A);
    assert_eq!(aib.to_bytes(), bytes);
}

#[cfg(feature = "t4t")]
#[test]
fn desfire_cc_file() {
    use ndef_poller::cc::t4t::T4tCc;
    let bytes = hex::decode("000f20003b00340406e10400800000").unwrap();
    let cc = T4tCc::from_bytes(&bytes).unwrap();
    assert_eq!(cc.mle, 0x3B);
    assert_eq!(cc.mlc, 0x34);
    assert_eq!(cc.file_id, [0xE1, 0x04]);
    assert_eq!(cc.file_size, 128);
    assert_eq!(cc.to_bytes(), bytes);
}

#[cfg(feature = "t5t")]
#[test]
fn st25dv_android_formatted_cc() {
    use ndef_poller::cc::t5t::T5tCc;
    // 4-byte CC with the MLEN overflow flag, as Android formats large tags
    let cc = T5tCc::from_bytes(&[0xE1, 0x40, 0xFF, 0x05]).unwrap();
    assert_eq!(cc.memory_len, 0xFF);
    assert!(cc.multiple_block_read);
    assert!(cc.mlen_overflow);
    assert_eq!(cc.to_bytes().unwrap(), vec![0xE1, 0x40, 0xFF, 0x05]);
}
