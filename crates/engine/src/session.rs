//! Ephemeral reviewer-side session state.
//!
//! Both structures are scratch data keyed by the reviewer: discarded on
//! cancel or completion, never persisted, and treated as possibly stale.
//! Every confirming action revalidates against the store first.

use std::collections::HashMap;
use std::sync::Mutex;

use gatekeeper_core::{Capability, CapabilitySet, Nickname, UserId};

/// Scratch state for a partial-grant review: which of the requested
/// capabilities the reviewer has toggled on so far.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSession {
    pub applicant: UserId,
    pub nickname: Nickname,
    pub requested: CapabilitySet,
    pub selected: CapabilitySet,
}

/// Open review sessions, one per reviewer.
#[derive(Debug, Default)]
pub struct ReviewSessions {
    inner: Mutex<HashMap<UserId, ReviewSession>>,
}

impl ReviewSessions {
    /// Open a session, replacing any stale one for this reviewer.
    pub fn open(&self, reviewer: UserId, session: ReviewSession) {
        let mut inner = self.inner.lock().expect("review sessions poisoned");
        inner.insert(reviewer, session);
    }

    pub fn get(&self, reviewer: UserId) -> Option<ReviewSession> {
        let inner = self.inner.lock().expect("review sessions poisoned");
        inner.get(&reviewer).cloned()
    }

    /// Flip one capability in the open session. Only requested capabilities
    /// can be toggled; anything else leaves the selection unchanged.
    pub fn toggle(&self, reviewer: UserId, capability: Capability) -> Option<ReviewSession> {
        let mut inner = self.inner.lock().expect("review sessions poisoned");
        let session = inner.get_mut(&reviewer)?;
        if session.requested.contains(capability) {
            if session.selected.contains(capability) {
                session.selected.revoke(capability);
            } else {
                session.selected.grant(capability);
            }
        }
        Some(session.clone())
    }

    /// Discard the session, if any. Never triggers persistence.
    pub fn cancel(&self, reviewer: UserId) {
        let mut inner = self.inner.lock().expect("review sessions poisoned");
        inner.remove(&reviewer);
    }
}

/// Per-reviewer ordered snapshot of the pending list, used to resolve
/// numeric picks. No TTL; a snapshot may be out of date and the pick is
/// revalidated against the access record before acting.
#[derive(Debug, Default)]
pub struct PendingSnapshots {
    inner: Mutex<HashMap<UserId, Vec<(Nickname, Option<UserId>)>>>,
}

impl PendingSnapshots {
    pub fn store(&self, reviewer: UserId, rows: Vec<(Nickname, Option<UserId>)>) {
        let mut inner = self.inner.lock().expect("pending snapshots poisoned");
        inner.insert(reviewer, rows);
    }

    /// Resolve a 1-based pick against the stored snapshot.
    pub fn pick(&self, reviewer: UserId, index: usize) -> Option<(Nickname, Option<UserId>)> {
        let inner = self.inner.lock().expect("pending snapshots poisoned");
        let rows = inner.get(&reviewer)?;
        if index == 0 {
            return None;
        }
        rows.get(index - 1).cloned()
    }
}
