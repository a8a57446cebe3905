//! Suggestion storage.
//!
//! Approved users can file improvement suggestions against a capability;
//! the administrator reviews and deletes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use gatekeeper_core::{Nickname, UserId};

use crate::error::StoreError;
use crate::pool::SharedPool;
use crate::retry::RetryPolicy;

/// Persisted suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRecord {
    pub id: i64,
    pub user_id: UserId,
    pub nickname: Nickname,
    /// Capability name the suggestion targets; kept as text so rows naming
    /// since-removed capabilities still list.
    pub capability: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SuggestionStore: Send + Sync {
    async fn insert(
        &self,
        user: UserId,
        nickname: &Nickname,
        capability: &str,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<SuggestionRecord>, StoreError>;

    async fn fetch(&self, id: i64) -> Result<Option<SuggestionRecord>, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// Postgres-backed suggestion store.
#[derive(Debug, Clone)]
pub struct PgSuggestionStore {
    pool: SharedPool,
    retry: RetryPolicy,
}

impl PgSuggestionStore {
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

fn suggestion_from_row(row: &PgRow) -> Result<SuggestionRecord, sqlx::Error> {
    Ok(SuggestionRecord {
        id: row.try_get("id")?,
        user_id: UserId::new(row.try_get("user_id")?),
        nickname: Nickname::trusted(row.try_get::<String, _>("nickname")?),
        capability: row.try_get("capability")?,
        text: row.try_get("suggestion")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SuggestionStore for PgSuggestionStore {
    async fn insert(
        &self,
        user: UserId,
        nickname: &Nickname,
        capability: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let pool = self.pool()?;
        let id = user.as_i64();
        let nick = nickname.as_str().to_string();
        let capability = capability.to_string();
        let text = text.to_string();
        self.retry
            .run("store suggestion", || {
                let pool = pool.clone();
                let nick = nick.clone();
                let capability = capability.clone();
                let text = text.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO suggestions (user_id, nickname, capability, suggestion) \
                         VALUES ($1, $2, $3, $4)",
                    )
                    .bind(id)
                    .bind(nick)
                    .bind(capability)
                    .bind(text)
                    .execute(&pool)
                    .await
                    .map(|_| ())
                }
            })
            .await
    }

    async fn list(&self) -> Result<Vec<SuggestionRecord>, StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("list suggestions", || {
                let pool = pool.clone();
                async move {
                    let rows = sqlx::query(
                        "SELECT id, user_id, nickname, capability, suggestion, created_at \
                         FROM suggestions ORDER BY created_at DESC",
                    )
                    .fetch_all(&pool)
                    .await?;

                    rows.iter()
                        .map(suggestion_from_row)
                        .collect::<Result<Vec<_>, sqlx::Error>>()
                }
            })
            .await
    }

    async fn fetch(&self, id: i64) -> Result<Option<SuggestionRecord>, StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("fetch suggestion", || {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        "SELECT id, user_id, nickname, capability, suggestion, created_at \
                         FROM suggestions WHERE id = $1",
                    )
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?
                    .map(|row| suggestion_from_row(&row))
                    .transpose()
                }
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let pool = self.pool()?;
        self.retry
            .run("delete suggestion", || {
                let pool = pool.clone();
                async move {
                    sqlx::query("DELETE FROM suggestions WHERE id = $1")
                        .bind(id)
                        .execute(&pool)
                        .await
                        .map(|_| ())
                }
            })
            .await
    }
}

/// In-memory suggestion store for tests and local development.
#[derive(Debug)]
pub struct MemorySuggestionStore {
    suggestions: std::sync::Mutex<Vec<SuggestionRecord>>,
    next_id: std::sync::atomic::AtomicI64,
}

impl MemorySuggestionStore {
    pub fn new() -> Self {
        Self {
            suggestions: std::sync::Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl SuggestionStore for MemorySuggestionStore {
    async fn insert(
        &self,
        user: UserId,
        nickname: &Nickname,
        capability: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut suggestions = self.suggestions.lock().expect("suggestion store poisoned");
        suggestions.push(SuggestionRecord {
            id,
            user_id: user,
            nickname: nickname.clone(),
            capability: capability.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SuggestionRecord>, StoreError> {
        let suggestions = self.suggestions.lock().expect("suggestion store poisoned");
        let mut out = suggestions.clone();
        out.reverse();
        Ok(out)
    }

    async fn fetch(&self, id: i64) -> Result<Option<SuggestionRecord>, StoreError> {
        let suggestions = self.suggestions.lock().expect("suggestion store poisoned");
        Ok(suggestions.iter().find(|s| s.id == id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut suggestions = self.suggestions.lock().expect("suggestion store poisoned");
        suggestions.retain(|s| s.id != id);
        Ok(())
    }
}
