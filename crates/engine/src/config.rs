use std::time::Duration;

use gatekeeper_core::UserId;

/// Engine tuning and the fixed administrator identity.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The single reviewer/administrator.
    pub admin: UserId,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl EngineConfig {
    pub fn new(admin: UserId) -> Self {
        Self {
            admin,
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 5000,
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        user == self.admin
    }
}
