//! Ban entry storage.

use async_trait::async_trait;
use sqlx::Row;

use gatekeeper_core::UserId;

use crate::error::StoreError;
use crate::pool::SharedPool;
use crate::retry::RetryPolicy;

/// Persisted ban entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub user_id: UserId,
    pub reason: String,
}

#[async_trait]
pub trait BanStore: Send + Sync {
    /// Idempotent insert: banning an already-banned identity writes nothing.
    async fn insert(&self, user: UserId, reason: &str) -> Result<(), StoreError>;

    async fn remove(&self, user: UserId) -> Result<(), StoreError>;

    async fn fetch(&self, user: UserId) -> Result<Option<BanRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<BanRecord>, StoreError>;
}

/// Postgres-backed ban store.
#[derive(Debug, Clone)]
pub struct PgBanStore {
    pool: SharedPool,
    retry: RetryPolicy,
}

impl PgBanStore {
    pub fn new(pool: SharedPool) -> Self {
        Self::with_retry(pool, RetryPolicy::default())
    }

    pub fn with_retry(pool: SharedPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    fn pool(&self) -> Result<sqlx::PgPool, StoreError> {
        self.pool.get().cloned().ok_or(StoreError::NotReady)
    }
}

#[async_trait]
impl BanStore for PgBanStore {
    async fn insert(&self, user: UserId, reason: &str) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        let reason = reason.to_string();
        self.retry
            .run("store ban entry", || {
                let pool = pool.clone();
                let reason = reason.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO banned_users (user_id, reason) VALUES ($1, $2) \
                         ON CONFLICT (user_id) DO NOTHING",
                    )
                    .bind(id)
                    .bind(reason)
                    .execute(&pool)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn remove(&self, user: UserId) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        self.retry
            .run("delete ban entry", || {
                let pool = pool.clone();
                async move {
                    sqlx::query("DELETE FROM banned_users WHERE user_id = $1")
                        .bind(id)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn fetch(&self, user: UserId) -> Result<Option<BanRecord>, StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        self.retry
            .run("fetch ban entry", || {
                let pool = pool.clone();
                async move {
                    let row = sqlx::query(
                        "SELECT user_id, reason FROM banned_users WHERE user_id = $1",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?;

                    row.map(|row| {
                        Ok::<BanRecord, sqlx::Error>(BanRecord {
                            user_id: UserId::new(row.try_get("user_id")?),
                            reason: row.try_get("reason")?,
                        })
                    })
                    .transpose()
                }
            })
            .await
    }

    async fn list(&self) -> Result<Vec<BanRecord>, StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("list ban entries", || {
                let pool = pool.clone();
                async move {
                    let rows = sqlx::query("SELECT user_id, reason FROM banned_users")
                        .fetch_all(&pool)
                        .await?;

                    rows.iter()
                        .map(|row| {
                            Ok(BanRecord {
                                user_id: UserId::new(row.try_get("user_id")?),
                                reason: row.try_get("reason")?,
                            })
                        })
                        .collect::<Result<Vec<_>, sqlx::Error>>()
                }
            })
            .await
    }
}

/// In-memory ban store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryBanStore {
    bans: std::sync::Mutex<Vec<BanRecord>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of persisted entries (test assertions).
    pub fn len(&self) -> usize {
        self.bans.lock().expect("ban store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StoreError::unavailable("memory ban store"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BanStore for MemoryBanStore {
    async fn insert(&self, user: UserId, reason: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut bans = self.bans.lock().expect("ban store poisoned");
        if !bans.iter().any(|b| b.user_id == user) {
            bans.push(BanRecord {
                user_id: user,
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, user: UserId) -> Result<(), StoreError> {
        self.check()?;
        let mut bans = self.bans.lock().expect("ban store poisoned");
        bans.retain(|b| b.user_id != user);
        Ok(())
    }

    async fn fetch(&self, user: UserId) -> Result<Option<BanRecord>, StoreError> {
        self.check()?;
        let bans = self.bans.lock().expect("ban store poisoned");
        Ok(bans.iter().find(|b| b.user_id == user).cloned())
    }

    async fn list(&self) -> Result<Vec<BanRecord>, StoreError> {
        self.check()?;
        let bans = self.bans.lock().expect("ban store poisoned");
        Ok(bans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_is_idempotent() {
        let store = MemoryBanStore::new();
        let user = UserId::new(9);

        store.insert(user, "spam").await.unwrap();
        store.insert(user, "spam again").await.unwrap();

        assert_eq!(store.len(), 1);
        let record = store.fetch(user).await.unwrap().unwrap();
        assert_eq!(record.reason, "spam");
    }

    #[tokio::test]
    async fn remove_then_fetch_is_none() {
        let store = MemoryBanStore::new();
        let user = UserId::new(9);

        store.insert(user, "spam").await.unwrap();
        store.remove(user).await.unwrap();

        assert_eq!(store.fetch(user).await.unwrap(), None);
    }
}
