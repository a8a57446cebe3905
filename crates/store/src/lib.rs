//! `gatekeeper-store` — persistence boundary for the authorization engine.
//!
//! Every operation is retry-wrapped and collapses driver failures into
//! [`StoreError`]; raw authorization JSON crosses this layer undecoded and
//! is interpreted exactly once, by the capability codec above it.

pub mod access;
pub mod bans;
pub mod error;
pub mod pool;
pub mod retry;
pub mod schema;
pub mod suggestions;

pub use access::{AccessRecord, AccessStore, MemoryAccessStore, PgAccessStore};
pub use bans::{BanRecord, BanStore, MemoryBanStore, PgBanStore};
pub use error::StoreError;
pub use pool::SharedPool;
pub use retry::RetryPolicy;
pub use suggestions::{
    MemorySuggestionStore, PgSuggestionStore, SuggestionRecord, SuggestionStore,
};
