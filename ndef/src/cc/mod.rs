// ndef-poller/ndef/src/cc/mod.rs

//! Capability container and attribute block codecs.
//!
//! Each tag technology advertises its NDEF area through a small fixed-format
//! header. These codecs are pure byte (de)serializers; access-rights and
//! version policy live in the pollers. Encode mirrors decode exactly since
//! tag formatting writes these structures back.

#[cfg(feature = "t2t")]
pub mod t2t;
#[cfg(feature = "t3t")]
pub mod t3t;
#[cfg(feature = "t4t")]
pub mod t4t;
#[cfg(feature = "t5t")]
pub mod t5t;

#[cfg(feature = "t2t")]
pub use t2t::T2tCc;
#[cfg(feature = "t3t")]
pub use t3t::AttributeBlock;
#[cfg(feature = "t4t")]
pub use t4t::T4tCc;
#[cfg(feature = "t5t")]
pub use t5t::T5tCc;

use crate::types::Version;

/// Capability container of the active session, keyed by technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityContainer {
    /// Type 2 capability container.
    #[cfg(feature = "t2t")]
    T2t(T2tCc),
    /// Type 3 attribute information block.
    #[cfg(feature = "t3t")]
    T3t(AttributeBlock),
    /// Type 4 capability container file.
    #[cfg(feature = "t4t")]
    T4t(T4tCc),
    /// Type 5 capability container.
    #[cfg(feature = "t5t")]
    T5t(T5tCc),
}

impl CapabilityContainer {
    /// Mapping-document version advertised by the tag.
    pub fn version(&self) -> Version {
        match self {
            #[cfg(feature = "t2t")]
            CapabilityContainer::T2t(cc) => cc.version,
            #[cfg(feature = "t3t")]
            CapabilityContainer::T3t(aib) => aib.version,
            #[cfg(feature = "t4t")]
            CapabilityContainer::T4t(cc) => cc.version,
            #[cfg(feature = "t5t")]
            CapabilityContainer::T5t(cc) => cc.version,
        }
    }
}
