//! `gatekeeper-engine` — the access authorization engine.
//!
//! Grants, tracks and revokes per-capability access behind a conversational
//! front end. Reads are shielded by a bounded TTL cache; every mutation goes
//! through the retry-wrapped store first and only touches the cache on
//! confirmed success.

pub mod additional;
pub mod approval;
pub mod bans;
pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod service;
pub mod session;

pub use approval::Decision;
pub use bans::BanRegistry;
pub use cache::AccessCache;
pub use config::EngineConfig;
pub use error::{DecisionOutcome, EngineError};
pub use notify::{Notice, Notifier, NotifyError};
pub use service::{AccessEngine, EngineStats};
pub use session::{PendingSnapshots, ReviewSession, ReviewSessions};

#[cfg(test)]
pub(crate) mod testutil;
