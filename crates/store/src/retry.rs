//! Bounded retry with linear backoff for store operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;

/// Retry discipline for a single store operation.
///
/// An operation is attempted up to `max_attempts` times with a linearly
/// increasing pause between attempts (`base_delay * attempt`). A reported
/// success means the statement committed; a reported failure means the
/// effect did not happen from the caller's point of view. An ambiguous
/// attempt may still have partially applied, so every statement run under
/// this policy must be safe to re-run (upserts, keyed deletes).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy without pauses, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// Each failed attempt is logged with the operation description; the
    /// underlying error never propagates past this point.
    pub async fn run<T, E, F, Fut>(&self, action: &str, mut op: F) -> Result<T, StoreError>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(action, attempt, error = %err, "store operation failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.base_delay * attempt).await;
                    }
                }
            }
        }
        Err(StoreError::unavailable(action))
    }
}
