//! `gatekeeper-core` — domain foundation for the access authorization engine.
//!
//! This crate contains **pure domain** types (no I/O, no transport concerns).

pub mod capability;
pub mod codec;
pub mod error;
pub mod identity;

pub use capability::{Capability, CapabilitySet};
pub use error::{DomainError, DomainResult};
pub use identity::{Nickname, UserId};
