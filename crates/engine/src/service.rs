//! Engine façade: query surface, ban handling and administrative commands.
//!
//! The read path always consults the cache first; on a miss it goes through
//! the retry-wrapped store, decodes once, and repopulates the cache.
//! Mutations hit the store first and touch the cache only on confirmed
//! success, never the reverse.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use gatekeeper_core::{Capability, CapabilitySet, Nickname, UserId, codec};
use gatekeeper_store::{AccessStore, BanRecord, BanStore, SuggestionRecord, SuggestionStore};

use crate::bans::BanRegistry;
use crate::cache::AccessCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::{Notice, Notifier};
use crate::session::{PendingSnapshots, ReviewSessions};

/// The access authorization engine.
///
/// One instance per process, shared behind `Arc`; all mutable state (cache,
/// ban set, review sessions) lives behind internal locks.
pub struct AccessEngine {
    pub(crate) store: Arc<dyn AccessStore>,
    pub(crate) suggestions: Arc<dyn SuggestionStore>,
    pub(crate) bans: BanRegistry,
    pub(crate) cache: AccessCache,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: EngineConfig,
    pub(crate) reviews: ReviewSessions,
    pub(crate) pending: PendingSnapshots,
}

/// Readiness and gauge snapshot for the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub store_ready: bool,
    pub banned: usize,
    pub cached: usize,
}

impl AccessEngine {
    pub fn new(
        store: Arc<dyn AccessStore>,
        ban_store: Arc<dyn BanStore>,
        suggestions: Arc<dyn SuggestionStore>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let cache = AccessCache::new(config.cache_ttl, config.cache_capacity);
        Self {
            store,
            suggestions,
            bans: BanRegistry::new(ban_store),
            cache,
            notifier,
            config,
            reviews: ReviewSessions::default(),
            pending: PendingSnapshots::default(),
        }
    }

    /// Preload the ban set and warm the cache from approved records.
    /// Failures are logged; the engine starts in fail-soft mode.
    pub async fn warm_from_store(&self) {
        match self.bans.list().await {
            Ok(records) => self.bans.load(records.into_iter().map(|r| r.user_id)),
            Err(err) => warn!(error = %err, "could not preload ban set"),
        }

        match self.store.list_approved().await {
            Ok(records) => {
                let mut warmed = 0usize;
                for record in records {
                    let Some(user) = record.user_id else { continue };
                    if let Some(caps) = codec::decode(record.capabilities.as_ref()) {
                        self.cache.put(user, record.nickname, caps);
                        warmed += 1;
                    }
                }
                info!(warmed, banned = self.bans.count(), "authorization state preloaded");
            }
            Err(err) => warn!(error = %err, "could not warm access cache"),
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.config.is_admin(user)
    }

    pub(crate) fn ensure_admin(&self, user: UserId) -> Result<(), EngineError> {
        if self.config.is_admin(user) {
            Ok(())
        } else {
            Err(EngineError::NotAdmin)
        }
    }

    // --- query surface ---

    /// Current capability set. Banned users always read as having none,
    /// regardless of cache or persisted grants.
    pub async fn capabilities(&self, user: UserId) -> Result<Option<CapabilitySet>, EngineError> {
        if self.bans.is_banned(user) {
            return Ok(None);
        }
        if let Some((_, caps)) = self.cache.get(user) {
            return Ok(Some(caps));
        }
        let Some(record) = self.store.fetch_by_user(user).await? else {
            return Ok(None);
        };
        let Some(caps) = codec::decode(record.capabilities.as_ref()) else {
            return Ok(None);
        };
        self.cache.put(user, record.nickname, caps.clone());
        Ok(Some(caps))
    }

    /// Fail-closed convenience: a store failure, a ban or a missing grant
    /// all read as `false`.
    pub async fn has_capability(&self, user: UserId, capability: Capability) -> bool {
        self.capabilities(user)
            .await
            .ok()
            .flatten()
            .is_some_and(|caps| caps.contains(capability))
    }

    /// The user's nickname, if they hold at least one capability.
    pub async fn approved_nickname(&self, user: UserId) -> Result<Option<Nickname>, EngineError> {
        if self.bans.is_banned(user) {
            return Ok(None);
        }
        if let Some((nickname, _)) = self.cache.get(user) {
            return Ok(Some(nickname));
        }
        let Some(record) = self.store.fetch_by_user(user).await? else {
            return Ok(None);
        };
        let Some(caps) = codec::decode(record.capabilities.as_ref()) else {
            return Ok(None);
        };
        let nickname = record.nickname.clone();
        self.cache.put(user, record.nickname, caps);
        Ok(Some(nickname))
    }

    /// Approved records, optionally narrowed to holders of one capability.
    pub async fn list_approved(
        &self,
        filter: Option<Capability>,
    ) -> Result<Vec<(Nickname, CapabilitySet)>, EngineError> {
        let records = self.store.list_approved().await?;
        Ok(records
            .into_iter()
            .filter_map(|r| codec::decode(r.capabilities.as_ref()).map(|caps| (r.nickname, caps)))
            .filter(|(_, caps)| filter.is_none_or(|cap| caps.contains(cap)))
            .collect())
    }

    pub async fn list_banned(&self) -> Result<Vec<BanRecord>, EngineError> {
        Ok(self.bans.list().await?)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            store_ready: self.store.ready(),
            banned: self.bans.count(),
            cached: self.cache.len(),
        }
    }

    // --- ban commands ---

    /// Ban an identity: persist the entry, revoke everything, drop the
    /// cache entry. Idempotent: an already-banned user produces no second
    /// write and no second notification; returns whether the ban is new.
    pub async fn ban(
        &self,
        reviewer: UserId,
        user: UserId,
        reason: &str,
    ) -> Result<bool, EngineError> {
        self.ensure_admin(reviewer)?;
        self.ban_inner(user, reason).await
    }

    pub(crate) async fn ban_inner(&self, user: UserId, reason: &str) -> Result<bool, EngineError> {
        if !self.bans.ban(user, reason).await? {
            return Ok(false);
        }
        // A ban revokes all capabilities unconditionally; if the record
        // delete fails the ban set still supersedes it on every read.
        if let Err(err) = self.store.delete_by_user(user).await {
            warn!(%user, error = %err, "could not delete access record for banned user");
        }
        self.cache.invalidate(user);
        self.notify_best_effort(
            self.config.admin,
            Notice::BanRecorded {
                user,
                reason: reason.to_string(),
            },
        )
        .await;
        self.notify_best_effort(
            user,
            Notice::Banned {
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(true)
    }

    pub async fn unban(&self, reviewer: UserId, user: UserId) -> Result<(), EngineError> {
        self.ensure_admin(reviewer)?;
        if !self.bans.unban(user).await? {
            return Err(EngineError::NotFound);
        }
        self.notify_best_effort(user, Notice::BanLifted).await;
        Ok(())
    }

    /// File a ban appeal, the only path reachable while banned. The stored
    /// reason is attached best-effort.
    pub async fn appeal_ban(&self, user: UserId, text: &str) -> Result<(), EngineError> {
        if !self.bans.is_banned(user) {
            return Err(EngineError::NotFound);
        }
        let ban_reason = match self.bans.reason(user).await {
            Ok(reason) => reason,
            Err(err) => {
                warn!(%user, error = %err, "could not read ban reason for appeal");
                None
            }
        };
        self.notify_best_effort(
            self.config.admin,
            Notice::BanAppealFiled {
                applicant: user,
                ban_reason,
                text: text.to_string(),
            },
        )
        .await;
        Ok(())
    }

    // --- revocation commands ---

    /// Self-revoke: delete the caller's own record and drop the cache
    /// entry. The user must re-apply from scratch afterwards.
    pub async fn revoke_own_nickname(
        &self,
        user: UserId,
        nickname: &Nickname,
    ) -> Result<(), EngineError> {
        self.store.delete_own(user, nickname).await?;
        self.cache.invalidate(user);
        Ok(())
    }

    /// Admin: revoke a single capability from a nickname. The cache entry
    /// is dropped so the next check sees the revocation immediately.
    pub async fn revoke_capability(
        &self,
        reviewer: UserId,
        nickname: &Nickname,
        capability: Capability,
    ) -> Result<(), EngineError> {
        self.ensure_admin(reviewer)?;
        let Some(record) = self.store.fetch_by_nickname(nickname).await? else {
            return Err(EngineError::NotFound);
        };
        let mut caps = codec::decode(record.capabilities.as_ref()).unwrap_or_default();
        caps.revoke(capability);
        self.store
            .store_capabilities_by_nickname(nickname, &codec::encode(&caps))
            .await?;
        self.cache.invalidate_by_nickname(nickname);
        Ok(())
    }

    /// Admin: add a nickname with a full grant; no user identity is
    /// attached until the user makes contact.
    pub async fn add_manual(&self, reviewer: UserId, nickname: &Nickname) -> Result<(), EngineError> {
        self.ensure_admin(reviewer)?;
        self.store
            .insert_manual(nickname, &codec::encode(&CapabilitySet::all()))
            .await?;
        Ok(())
    }

    /// Admin: remove a nickname outright.
    pub async fn delete_manual(
        &self,
        reviewer: UserId,
        nickname: &Nickname,
    ) -> Result<(), EngineError> {
        self.ensure_admin(reviewer)?;
        self.store.delete_by_nickname(nickname).await?;
        self.cache.invalidate_by_nickname(nickname);
        Ok(())
    }

    // --- suggestions ---

    /// File an improvement suggestion against one capability. Requires an
    /// approved nickname.
    pub async fn file_suggestion(
        &self,
        user: UserId,
        capability: Capability,
        text: &str,
    ) -> Result<(), EngineError> {
        let Some(nickname) = self.approved_nickname(user).await? else {
            return Err(EngineError::NoAccess);
        };
        self.suggestions
            .insert(user, &nickname, capability.name(), text)
            .await?;
        self.notify_best_effort(
            self.config.admin,
            Notice::SuggestionFiled {
                nickname,
                capability,
                text: text.to_string(),
            },
        )
        .await;
        Ok(())
    }

    pub async fn list_suggestions(
        &self,
        reviewer: UserId,
    ) -> Result<Vec<SuggestionRecord>, EngineError> {
        self.ensure_admin(reviewer)?;
        Ok(self.suggestions.list().await?)
    }

    pub async fn suggestion(
        &self,
        reviewer: UserId,
        id: i64,
    ) -> Result<Option<SuggestionRecord>, EngineError> {
        self.ensure_admin(reviewer)?;
        Ok(self.suggestions.fetch(id).await?)
    }

    pub async fn delete_suggestion(&self, reviewer: UserId, id: i64) -> Result<(), EngineError> {
        self.ensure_admin(reviewer)?;
        Ok(self.suggestions.delete(id).await?)
    }

    pub(crate) async fn notify_best_effort(&self, user: UserId, notice: Notice) {
        if let Err(err) = self.notifier.notify(user, notice).await {
            // The mutation is already durable; delivery is best effort.
            warn!(%user, error = %err, "notification failed");
        }
    }
}
