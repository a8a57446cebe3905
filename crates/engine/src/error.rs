//! Engine error taxonomy.

use thiserror::Error;

use gatekeeper_core::{CapabilitySet, DomainError};
use gatekeeper_store::StoreError;

/// Failure of an engine operation.
///
/// Store failures are soft: the caller tells the user to try again later.
/// Validation failures are reported inline and never touch persistence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transient store failure, surfaced after exhausted retries.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// At least one capability must be selected.
    #[error("no capabilities selected")]
    EmptySelection,

    #[error("caller is not the administrator")]
    NotAdmin,

    #[error("user is banned")]
    Banned,

    /// A pending application already exists for this user.
    #[error("application already filed")]
    AlreadyApplied,

    /// The caller already holds a live grant.
    #[error("access already granted")]
    AlreadyApproved,

    /// The caller holds no capabilities.
    #[error("no access")]
    NoAccess,

    /// Every known capability is already granted.
    #[error("nothing left to request")]
    NothingMissing,

    /// No review session is open for this reviewer.
    #[error("no open review session")]
    NoSession,

    /// The pending-list snapshot no longer matches the store.
    #[error("pending list is stale")]
    StaleList,

    #[error("record not found")]
    NotFound,
}

/// Resolution of a reviewer decision.
///
/// `AlreadyHandled` is a soft outcome, not an error: the application was
/// resolved by a concurrent action before this one re-read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Grant applied; carries the user's full merged set.
    Granted(CapabilitySet),
    Rejected,
    Banned,
    AlreadyHandled,
}
