//! Access record storage.
//!
//! The `capabilities` and `requested` columns cross this boundary as raw
//! JSON values (canonical maps or legacy markers); the engine decodes them
//! exactly once through the capability codec. All mutation SQL is written
//! upsert-style so a retry after an ambiguous failure is safe.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;

use gatekeeper_core::{Nickname, UserId};

use crate::error::StoreError;
use crate::pool::SharedPool;
use crate::retry::RetryPolicy;

/// Persisted authorization state for one user/nickname.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    pub nickname: Nickname,
    /// Unset until the user's first contact (manual adds have no identity yet).
    pub user_id: Option<UserId>,
    /// Granted capability value; `None` while an application is pending.
    pub capabilities: Option<Value>,
    /// Requested capability value awaiting review.
    pub requested: Option<Value>,
}

#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Whether the backing store can accept operations right now.
    fn ready(&self) -> bool {
        true
    }

    async fn fetch_by_user(&self, user: UserId) -> Result<Option<AccessRecord>, StoreError>;

    async fn fetch_by_nickname(
        &self,
        nickname: &Nickname,
    ) -> Result<Option<AccessRecord>, StoreError>;

    /// Insert or reset an application: no grant, requested set attached.
    async fn upsert_application(
        &self,
        nickname: &Nickname,
        user: UserId,
        requested: &Value,
    ) -> Result<(), StoreError>;

    /// Write a merged grant and clear the pending request.
    async fn store_grant(&self, user: UserId, capabilities: &Value) -> Result<(), StoreError>;

    /// Overwrite the grant for a nickname (admin revoke path).
    async fn store_capabilities_by_nickname(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError>;

    /// Attach a request marker to an existing record; the grant column is
    /// left untouched.
    async fn store_requested(&self, user: UserId, requested: &Value) -> Result<(), StoreError>;

    /// Admin manual add: a grant with no user identity attached yet.
    async fn insert_manual(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError>;

    async fn delete_by_user(&self, user: UserId) -> Result<(), StoreError>;

    async fn delete_by_nickname(&self, nickname: &Nickname) -> Result<(), StoreError>;

    /// Delete a user's own record; both keys must match.
    async fn delete_own(&self, user: UserId, nickname: &Nickname) -> Result<(), StoreError>;

    /// Applications awaiting review (no grant yet).
    async fn list_pending(&self) -> Result<Vec<(Nickname, Option<UserId>)>, StoreError>;

    /// Records holding any grant value.
    async fn list_approved(&self) -> Result<Vec<AccessRecord>, StoreError>;
}

/// Postgres-backed access record store.
#[derive(Debug, Clone)]
pub struct PgAccessStore {
    pool: SharedPool,
    retry: RetryPolicy,
}

impl PgAccessStore {
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

fn record_from_row(row: &PgRow) -> Result<AccessRecord, sqlx::Error> {
    Ok(AccessRecord {
        nickname: Nickname::trusted(row.try_get::<String, _>("nickname")?),
        user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
        capabilities: row.try_get("capabilities")?,
        requested: row.try_get("requested")?,
    })
}

#[async_trait]
impl AccessStore for PgAccessStore {
    fn ready(&self) -> bool {
        self.pool.is_ready()
    }

    async fn fetch_by_user(&self, user: UserId) -> Result<Option<AccessRecord>, StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        self.retry
            .run("fetch access record by user", || {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        "SELECT nickname, user_id, capabilities, requested \
                         FROM access_list WHERE user_id = $1",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?
                    .map(|row| record_from_row(&row))
                    .transpose()
                }
            })
            .await
    }

    async fn fetch_by_nickname(
        &self,
        nickname: &Nickname,
    ) -> Result<Option<AccessRecord>, StoreError> {
        let pool = self.pool()?;
        let nick = nickname.as_str().to_string();
        self.retry
            .run("fetch access record by nickname", || {
                let pool = pool.clone();
                let nick = nick.clone();
                async move {
                    sqlx::query(
                        "SELECT nickname, user_id, capabilities, requested \
                         FROM access_list WHERE nickname = $1",
                    )
                    .bind(nick)
                    .fetch_optional(&pool)
                    .await?
                    .map(|row| record_from_row(&row))
                    .transpose()
                }
            })
            .await
    }

    async fn upsert_application(
        &self,
        nickname: &Nickname,
        user: UserId,
        requested: &Value,
    ) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let nick = nickname.as_str().to_string();
        let id = user.as_i64();
        let requested = requested.clone();
        self.retry
            .run("store application", || {
                let pool = pool.clone();
                let nick = nick.clone();
                let requested = requested.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO access_list (nickname, user_id, capabilities, requested) \
                         VALUES ($1, $2, NULL, $3) \
                         ON CONFLICT (nickname) DO UPDATE \
                         SET user_id = EXCLUDED.user_id, \
                             capabilities = NULL, \
                             requested = EXCLUDED.requested",
                    )
                    .bind(nick)
                    .bind(id)
                    .bind(requested)
                    .execute(&pool)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn store_grant(&self, user: UserId, capabilities: &Value) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        let capabilities = capabilities.clone();
        self.retry
            .run("store grant", || {
                let pool = pool.clone();
                let capabilities = capabilities.clone();
                async move {
                    sqlx::query(
                        "UPDATE access_list SET capabilities = $1, requested = NULL \
                         WHERE user_id = $2",
                    )
                    .bind(capabilities)
                    .bind(id)
                    .execute(&pool)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn store_capabilities_by_nickname(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let nick = nickname.as_str().to_string();
        let capabilities = capabilities.clone();
        self.retry
            .run("store capabilities by nickname", || {
                let pool = pool.clone();
                let nick = nick.clone();
                let capabilities = capabilities.clone();
                async move {
                    sqlx::query("UPDATE access_list SET capabilities = $1 WHERE nickname = $2")
                        .bind(capabilities)
                        .bind(nick)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn store_requested(&self, user: UserId, requested: &Value) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        let requested = requested.clone();
        self.retry
            .run("store additional request", || {
                let pool = pool.clone();
                let requested = requested.clone();
                async move {
                    sqlx::query("UPDATE access_list SET requested = $1 WHERE user_id = $2")
                        .bind(requested)
                        .bind(id)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn insert_manual(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let nick = nickname.as_str().to_string();
        let capabilities = capabilities.clone();
        self.retry
            .run("manual add", || {
                let pool = pool.clone();
                let nick = nick.clone();
                let capabilities = capabilities.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO access_list (nickname, capabilities) VALUES ($1, $2) \
                         ON CONFLICT (nickname) DO UPDATE \
                         SET capabilities = EXCLUDED.capabilities",
                    )
                    .bind(nick)
                    .bind(capabilities)
                    .execute(&pool)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn delete_by_user(&self, user: UserId) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        self.retry
            .run("delete access record by user", || {
                let pool = pool.clone();
                async move {
                    sqlx::query("DELETE FROM access_list WHERE user_id = $1")
                        .bind(id)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn delete_by_nickname(&self, nickname: &Nickname) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let nick = nickname.as_str().to_string();
        self.retry
            .run("delete access record by nickname", || {
                let pool = pool.clone();
                let nick = nick.clone();
                async move {
                    sqlx::query("DELETE FROM access_list WHERE nickname = $1")
                        .bind(nick)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn delete_own(&self, user: UserId, nickname: &Nickname) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        let nick = nickname.as_str().to_string();
        self.retry
            .run("delete own access record", || {
                let pool = pool.clone();
                let nick = nick.clone();
                async move {
                    sqlx::query("DELETE FROM access_list WHERE user_id = $1 AND nickname = $2")
                        .bind(id)
                        .bind(nick)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }

    async fn list_pending(&self) -> Result<Vec<(Nickname, Option<UserId>)>, StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("list pending applications", || {
                let pool = pool.clone();
                async move {
                    let rows = sqlx::query(
                        "SELECT nickname, user_id FROM access_list \
                         WHERE capabilities IS NULL ORDER BY nickname",
                    )
                    .fetch_all(&pool)
                    .await?;

                    rows.iter()
                        .map(|row| {
                            Ok((
                                Nickname::trusted(row.try_get::<String, _>("nickname")?),
                                row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
                            ))
                        })
                        .collect::<Result<Vec<_>, sqlx::Error>>()
                }
            })
            .await
    }

    async fn list_approved(&self) -> Result<Vec<AccessRecord>, StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("list approved records", || {
                let pool = pool.clone();
                async move {
                    let rows = sqlx::query(
                        "SELECT nickname, user_id, capabilities, requested \
                         FROM access_list WHERE capabilities IS NOT NULL \
                         ORDER BY nickname",
                    )
                    .fetch_all(&pool)
                    .await?;

                    rows.iter()
                        .map(record_from_row)
                        .collect::<Result<Vec<_>, sqlx::Error>>()
                }
            })
            .await
    }
}

/// In-memory access store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryAccessStore {
    records: std::sync::Mutex<Vec<AccessRecord>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, simulating an outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Seed a record directly (test setup).
    pub fn insert_record(&self, record: AccessRecord) {
        self.records.lock().expect("access store poisoned").push(record);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StoreError::unavailable("memory access store"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn fetch_by_user(&self, user: UserId) -> Result<Option<AccessRecord>, StoreError> {
        self.check()?;
        let records = self.records.lock().expect("access store poisoned");
        Ok(records.iter().find(|r| r.user_id == Some(user)).cloned())
    }

    async fn fetch_by_nickname(
        &self,
        nickname: &Nickname,
    ) -> Result<Option<AccessRecord>, StoreError> {
        self.check()?;
        let records = self.records.lock().expect("access store poisoned");
        Ok(records.iter().find(|r| &r.nickname == nickname).cloned())
    }

    async fn upsert_application(
        &self,
        nickname: &Nickname,
        user: UserId,
        requested: &Value,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        if let Some(existing) = records.iter_mut().find(|r| &r.nickname == nickname) {
            existing.user_id = Some(user);
            existing.capabilities = None;
            existing.requested = Some(requested.clone());
        } else {
            records.push(AccessRecord {
                nickname: nickname.clone(),
                user_id: Some(user),
                capabilities: None,
                requested: Some(requested.clone()),
            });
        }
        Ok(())
    }

    async fn store_grant(&self, user: UserId, capabilities: &Value) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        if let Some(record) = records.iter_mut().find(|r| r.user_id == Some(user)) {
            record.capabilities = Some(capabilities.clone());
            record.requested = None;
        }
        Ok(())
    }

    async fn store_capabilities_by_nickname(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        if let Some(record) = records.iter_mut().find(|r| &r.nickname == nickname) {
            record.capabilities = Some(capabilities.clone());
        }
        Ok(())
    }

    async fn store_requested(&self, user: UserId, requested: &Value) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        if let Some(record) = records.iter_mut().find(|r| r.user_id == Some(user)) {
            record.requested = Some(requested.clone());
        }
        Ok(())
    }

    async fn insert_manual(
        &self,
        nickname: &Nickname,
        capabilities: &Value,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        if let Some(record) = records.iter_mut().find(|r| &r.nickname == nickname) {
            record.capabilities = Some(capabilities.clone());
        } else {
            records.push(AccessRecord {
                nickname: nickname.clone(),
                user_id: None,
                capabilities: Some(capabilities.clone()),
                requested: None,
            });
        }
        Ok(())
    }

    async fn delete_by_user(&self, user: UserId) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        records.retain(|r| r.user_id != Some(user));
        Ok(())
    }

    async fn delete_by_nickname(&self, nickname: &Nickname) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        records.retain(|r| &r.nickname != nickname);
        Ok(())
    }

    async fn delete_own(&self, user: UserId, nickname: &Nickname) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().expect("access store poisoned");
        records.retain(|r| !(r.user_id == Some(user) && &r.nickname == nickname));
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<(Nickname, Option<UserId>)>, StoreError> {
        self.check()?;
        let records = self.records.lock().expect("access store poisoned");
        Ok(records
            .iter()
            .filter(|r| r.capabilities.is_none())
            .map(|r| (r.nickname.clone(), r.user_id))
            .collect())
    }

    async fn list_approved(&self) -> Result<Vec<AccessRecord>, StoreError> {
        self.check()?;
        let records = self.records.lock().expect("access store poisoned");
        Ok(records
            .iter()
            .filter(|r| r.capabilities.is_some())
            .cloned()
            .collect())
    }
}
