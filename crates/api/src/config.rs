//! Environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

use gatekeeper_core::UserId;

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; the process runs fail-soft without one.
    pub database_url: Option<String>,
    /// The single reviewer/administrator identity.
    pub admin: UserId,
    pub bind: SocketAddr,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin = std::env::var("ADMIN_ID")
            .context("ADMIN_ID is not set")?
            .parse::<i64>()
            .context("ADMIN_ID must be a numeric user id")?;

        let database_url = std::env::var("DATABASE_URL").ok();
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; starting without a store");
        }

        let bind = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let cache_ttl = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map_or(Duration::from_secs(300), Duration::from_secs);

        let cache_capacity = std::env::var("CACHE_CAPACITY")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(5000);

        Ok(Self {
            database_url,
            admin: UserId::new(admin),
            bind,
            cache_ttl,
            cache_capacity,
        })
    }
}
