//! Ban registry: in-memory banned set backed by the ban store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use gatekeeper_core::UserId;
use gatekeeper_store::{BanRecord, BanStore, StoreError};

/// Process-wide set of banned identities.
///
/// Loaded from the store at startup; the set is consulted on every
/// authorization read, the store only on mutation. A ban entry supersedes
/// all access record state.
pub struct BanRegistry {
    store: Arc<dyn BanStore>,
    banned: Mutex<HashSet<UserId>>,
}

impl BanRegistry {
    pub fn new(store: Arc<dyn BanStore>) -> Self {
        Self {
            store,
            banned: Mutex::new(HashSet::new()),
        }
    }

    /// Seed the in-memory set (startup preload).
    pub fn load(&self, ids: impl IntoIterator<Item = UserId>) {
        let mut banned = self.banned.lock().expect("ban set poisoned");
        banned.extend(ids);
    }

    pub fn is_banned(&self, user: UserId) -> bool {
        self.banned.lock().expect("ban set poisoned").contains(&user)
    }

    pub fn count(&self) -> usize {
        self.banned.lock().expect("ban set poisoned").len()
    }

    /// Persist a ban entry and mark the identity banned.
    ///
    /// Returns `false` without touching the store if the user is already
    /// banned, so callers cannot double-persist or double-notify. The set
    /// is updated only after the store confirms the write.
    pub async fn ban(&self, user: UserId, reason: &str) -> Result<bool, StoreError> {
        if self.is_banned(user) {
            return Ok(false);
        }
        self.store.insert(user, reason).await?;
        self.banned.lock().expect("ban set poisoned").insert(user);
        Ok(true)
    }

    /// Remove the persisted entry. Never restores capabilities; the user
    /// must re-apply. Returns `false` if the user was not banned.
    pub async fn unban(&self, user: UserId) -> Result<bool, StoreError> {
        if !self.is_banned(user) {
            return Ok(false);
        }
        self.store.remove(user).await?;
        self.banned.lock().expect("ban set poisoned").remove(&user);
        Ok(true)
    }

    /// Stored ban reason, if any.
    pub async fn reason(&self, user: UserId) -> Result<Option<String>, StoreError> {
        Ok(self.store.fetch(user).await?.map(|record| record.reason))
    }

    pub async fn list(&self) -> Result<Vec<BanRecord>, StoreError> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_store::MemoryBanStore;

    #[tokio::test]
    async fn ban_is_idempotent_against_store_and_set() {
        let store = Arc::new(MemoryBanStore::new());
        let registry = BanRegistry::new(store.clone());
        let user = UserId::new(5);

        assert!(registry.ban(user, "spam").await.unwrap());
        assert!(!registry.ban(user, "spam again").await.unwrap());

        assert_eq!(store.len(), 1);
        assert!(registry.is_banned(user));
    }

    #[tokio::test]
    async fn failed_persistence_leaves_set_unchanged() {
        let store = Arc::new(MemoryBanStore::new());
        let registry = BanRegistry::new(store.clone());
        store.set_failing(true);

        let err = registry.ban(UserId::new(5), "spam").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert!(!registry.is_banned(UserId::new(5)));
    }

    #[tokio::test]
    async fn unban_removes_entry_without_restoring_anything() {
        let store = Arc::new(MemoryBanStore::new());
        let registry = BanRegistry::new(store.clone());
        let user = UserId::new(5);

        registry.ban(user, "spam").await.unwrap();
        assert!(registry.unban(user).await.unwrap());

        assert!(!registry.is_banned(user));
        assert!(store.is_empty());
        // Unbanning an unbanned user is a no-op.
        assert!(!registry.unban(user).await.unwrap());
    }

    #[tokio::test]
    async fn load_seeds_the_set() {
        let registry = BanRegistry::new(Arc::new(MemoryBanStore::new()));
        registry.load([UserId::new(1), UserId::new(2)]);

        assert!(registry.is_banned(UserId::new(1)));
        assert_eq!(registry.count(), 2);
    }
}
