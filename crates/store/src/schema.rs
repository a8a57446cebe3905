//! Logical schema bootstrap.
//!
//! The deployed database may predate this service; every statement is
//! `IF NOT EXISTS` so bring-up is safe to repeat.

use crate::error::StoreError;
use crate::pool::SharedPool;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS access_list (\
        nickname TEXT PRIMARY KEY, \
        user_id BIGINT UNIQUE, \
        capabilities JSONB, \
        requested JSONB\
    )",
    "CREATE TABLE IF NOT EXISTS banned_users (\
        user_id BIGINT PRIMARY KEY, \
        reason TEXT NOT NULL\
    )",
    "CREATE TABLE IF NOT EXISTS suggestions (\
        id BIGSERIAL PRIMARY KEY, \
        user_id BIGINT NOT NULL, \
        nickname TEXT NOT NULL, \
        capability TEXT NOT NULL, \
        suggestion TEXT NOT NULL, \
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\
    )",
];

/// Create the tables this service relies on if they are absent.
pub async fn ensure_schema(pool: &SharedPool) -> Result<(), StoreError> {
    let pool = pool.get().ok_or(StoreError::NotReady)?;
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "schema bootstrap failed");
                StoreError::unavailable("ensure schema")
            })?;
    }
    Ok(())
}
