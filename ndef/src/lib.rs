// ndef-poller/ndef/src/lib.rs

//! ndef-poller
//!
//! NDEF tag access for NFC Forum Type 2 to Type 5 tags over a pluggable
//! transceiver.
#![warn(missing_docs)]

pub mod cc;
pub mod error;
pub mod message;
pub mod poller;
pub mod prelude;
pub mod test_support;
pub mod tlv;
pub mod transceiver;
pub mod types;
pub mod utils;

// Re-export common types at crate root so `crate::Error`, `crate::Result`,
// and the newtypes in `types` are available for consumers and for
// convenient `prelude` re-exports.
pub use crate::error::*;
pub use crate::types::*;

pub use prelude::*;
