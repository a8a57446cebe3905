//! Bounded TTL cache over approved access records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gatekeeper_core::{CapabilitySet, Nickname, UserId};

#[derive(Debug, Clone)]
struct CacheEntry {
    nickname: Nickname,
    capabilities: CapabilitySet,
    expires_at: Instant,
}

/// Read-through cache: user → (nickname, capability snapshot, expiry).
///
/// Never the system of record. Entries are written only after the
/// corresponding persistent mutation is confirmed, are never trusted past
/// their expiry, and the map never grows past its capacity. One mutex
/// serializes inserts, sweeps and evictions, so an eviction cannot
/// resurrect an expired entry.
#[derive(Debug)]
pub struct AccessCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<UserId, CacheEntry>>,
}

impl AccessCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a live entry. An expired entry is evicted on the spot and
    /// reads as a miss; the caller falls through to the store.
    pub fn get(&self, user: UserId) -> Option<(Nickname, CapabilitySet)> {
        let mut entries = self.entries.lock().expect("access cache poisoned");
        let now = Instant::now();
        match entries.get(&user) {
            Some(entry) if entry.expires_at > now => {
                Some((entry.nickname.clone(), entry.capabilities.clone()))
            }
            Some(_) => {
                entries.remove(&user);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite with a fresh expiry. Expired entries are swept
    /// first; if the cache is still full, the entry closest to expiry is
    /// evicted. Never fails.
    pub fn put(&self, user: UserId, nickname: Nickname, capabilities: CapabilitySet) {
        let mut entries = self.entries.lock().expect("access cache poisoned");
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);

        if entries.len() >= self.capacity && !entries.contains_key(&user) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            user,
            CacheEntry {
                nickname,
                capabilities,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, user: UserId) {
        let mut entries = self.entries.lock().expect("access cache poisoned");
        entries.remove(&user);
    }

    pub fn invalidate_by_nickname(&self, nickname: &Nickname) {
        let mut entries = self.entries.lock().expect("access cache poisoned");
        entries.retain(|_, entry| &entry.nickname != nickname);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("access cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
