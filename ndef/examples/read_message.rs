// Detect and read the NDEF message of a (simulated) Type 2 tag.

// The simulators stand in for a real radio stack; plug your own
// `Transceiver` implementation in to talk to actual hardware.

use ndef_poller::prelude::*;
use ndef_poller::test_support::T2tTagSim;

fn main() -> Result<()> {
    env_logger::init();

    let sim = T2tTagSim::with_message(
        144,
        &[0xD1, 0x01, 0x09, 0x54, 0x02, b'e', b'n', b'h', b'e', b'l', b'l', b'o', b'!'],
    );
    let device = sim.device();
    println!("Tag in field: {:?}, UID {}", device.tag_type(), device.uid.to_hex());

    let mut ctx = NdefContext::new(Box::new(sim), device)?;
    let info = ctx.detect()?;
    println!(
        "Detected: state {:?}, mapping v{}.{}, {} of {} bytes used",
        info.state, info.version.major, info.version.minor, info.message_len, info.area_len
    );

    let mut buf = vec![0u8; info.message_len];
    ctx.read_raw_message(&mut buf)?;
    println!("Raw message: {}", bytes_to_hex_spaced(&buf));
    Ok(())
}
