// ndef-poller/ndef/src/prelude.rs

//! One-stop import for the common crate surface.

pub use crate::cc::CapabilityContainer;
pub use crate::message::{Message, Record};
pub use crate::poller::{FormatOptions, NdefContext};
pub use crate::transceiver::{DiscoveredDevice, ListenTech, NfcaSubtype, Transceiver};
pub use crate::{
    BlockData, Error, NdefInfo, NdefState, Result, ServiceCode, TagType, Uid, Version,
};

// Re-export small utilities for convenience
pub use crate::utils::{bytes_to_hex, bytes_to_hex_spaced};
