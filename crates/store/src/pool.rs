//! Shared connection pool with a readiness gate.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Cheap clonable handle around a once-initialized Postgres pool.
///
/// The engine is constructed before the database is reachable; store
/// operations check readiness first and fail soft while the pool is unset.
#[derive(Debug, Clone, Default)]
pub struct SharedPool {
    inner: Arc<OnceLock<PgPool>>,
}

impl SharedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a connected pool. Later calls are no-ops.
    pub fn set(&self, pool: PgPool) {
        let _ = self.inner.set(pool);
    }

    pub fn get(&self) -> Option<&PgPool> {
        self.inner.get()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Connect and install the pool.
    ///
    /// Sized for a serverless backend that admits only a couple of
    /// connections per client.
    pub async fn connect(&self, url: &str) -> Result<(), sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        self.set(pool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_pool_is_not_ready() {
        let pool = SharedPool::new();
        assert!(!pool.is_ready());
        assert!(pool.get().is_none());
    }
}
