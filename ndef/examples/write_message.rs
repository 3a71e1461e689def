// Format a blank (simulated) Type 5 tag and store a text record on it.

use ndef_poller::prelude::*;
use ndef_poller::test_support::T5tTagSim;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let sim = T5tTagSim::blank(64, 4);
    let device = sim.device();
    let mut ctx = NdefContext::new(Box::new(sim), device)?;

    if ctx.detect().is_err() {
        println!("Blank tag, formatting...");
        ctx.format(None, FormatOptions::NfcForum)?;
    }

    let message: Message = Record::text_record("en", "hello from ndef-poller")?.into();
    ctx.write_message(&message)?;
    println!("Wrote {} bytes", ctx.message_len());

    let info = ctx.detect()?;
    let mut buf = vec![0u8; info.message_len];
    ctx.read_raw_message(&mut buf)?;
    println!("Read back:   {}", bytes_to_hex_spaced(&buf));
    assert_eq!(buf, message.to_bytes());
    Ok(())
}
