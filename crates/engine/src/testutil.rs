//! Shared test fixtures: in-memory stores and a recording notifier.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gatekeeper_core::UserId;
use gatekeeper_store::{MemoryAccessStore, MemoryBanStore, MemorySuggestionStore};

use crate::config::EngineConfig;
use crate::notify::{Notice, Notifier, NotifyError};
use crate::service::AccessEngine;

pub const ADMIN: UserId = UserId::new(1000);

/// Records notices instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Notice)>>,
}

impl RecordingNotifier {
    pub fn sent_to(&self, user: UserId) -> Vec<Notice> {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("notifier poisoned").len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: UserId, notice: Notice) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .push((user, notice));
        Ok(())
    }
}

pub struct TestHarness {
    pub engine: Arc<AccessEngine>,
    pub access: Arc<MemoryAccessStore>,
    pub bans: Arc<MemoryBanStore>,
    pub suggestions: Arc<MemorySuggestionStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> TestHarness {
    let access = Arc::new(MemoryAccessStore::new());
    let bans = Arc::new(MemoryBanStore::new());
    let suggestions = Arc::new(MemorySuggestionStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(AccessEngine::new(
        access.clone(),
        bans.clone(),
        suggestions.clone(),
        notifier.clone(),
        EngineConfig::new(ADMIN),
    ));
    TestHarness {
        engine,
        access,
        bans,
        suggestions,
        notifier,
    }
}
