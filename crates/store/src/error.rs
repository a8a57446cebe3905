//! Store error model.

use thiserror::Error;

/// Failure of a persistence operation, as seen by callers.
///
/// The retry layer collapses every underlying driver error into
/// [`StoreError::Unavailable`]; callers never see a raw `sqlx::Error` and
/// treat both variants as the same transient condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The connection pool has not been initialized.
    #[error("store is not ready")]
    NotReady,

    /// Every retry attempt failed.
    #[error("store unavailable during {action}")]
    Unavailable { action: String },
}

impl StoreError {
    pub fn unavailable(action: impl Into<String>) -> Self {
        Self::Unavailable {
            action: action.into(),
        }
    }
}
