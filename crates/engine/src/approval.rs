//! Approval workflow: application filing and reviewer decisions.

use gatekeeper_core::{Capability, CapabilitySet, DomainError, Nickname, UserId, codec};

use crate::error::{DecisionOutcome, EngineError};
use crate::notify::Notice;
use crate::service::AccessEngine;
use crate::session::ReviewSession;

/// Reviewer decision over a pending application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    GrantAll,
    GrantSubset(CapabilitySet),
    Reject { reason: String },
    Ban { reason: String },
}

impl AccessEngine {
    /// File a new application: nickname + description + a non-empty
    /// selection of requested capabilities.
    ///
    /// Validation failures are reported inline and never touch the store.
    pub async fn file_application(
        &self,
        user: UserId,
        nickname: &str,
        description: &str,
        requested: CapabilitySet,
    ) -> Result<(), EngineError> {
        if self.bans.is_banned(user) {
            return Err(EngineError::Banned);
        }
        let nickname = Nickname::parse(nickname)?;
        if description.trim().chars().count() < 3 {
            return Err(DomainError::validation("description is too short").into());
        }
        if requested.is_empty() {
            return Err(EngineError::EmptySelection);
        }

        if let Some(record) = self.store.fetch_by_user(user).await? {
            if codec::decode(record.capabilities.as_ref()).is_some() {
                return Err(EngineError::AlreadyApproved);
            }
            return Err(EngineError::AlreadyApplied);
        }

        self.store
            .upsert_application(&nickname, user, &codec::encode(&requested))
            .await?;

        let compact = requested.compact();
        self.notify_best_effort(
            self.config.admin,
            Notice::ApplicationFiled {
                applicant: user,
                nickname,
                description: description.trim().to_string(),
                requested,
                compact,
            },
        )
        .await;
        Ok(())
    }

    /// Apply a reviewer decision to an application.
    pub async fn decide(
        &self,
        reviewer: UserId,
        applicant: UserId,
        decision: Decision,
    ) -> Result<DecisionOutcome, EngineError> {
        self.ensure_admin(reviewer)?;
        match decision {
            Decision::GrantAll => self.grant(applicant, None).await,
            Decision::GrantSubset(subset) => {
                if subset.is_empty() {
                    return Err(EngineError::EmptySelection);
                }
                self.grant(applicant, Some(subset)).await
            }
            Decision::Reject { reason } => self.reject(applicant, &reason).await,
            Decision::Ban { reason } => {
                if self.ban_inner(applicant, &reason).await? {
                    Ok(DecisionOutcome::Banned)
                } else {
                    Ok(DecisionOutcome::AlreadyHandled)
                }
            }
        }
    }

    /// Merge-and-persist. Always re-reads current state: a duplicate click
    /// after the first grant finds nothing pending and resolves softly.
    async fn grant(
        &self,
        applicant: UserId,
        subset: Option<CapabilitySet>,
    ) -> Result<DecisionOutcome, EngineError> {
        let Some(record) = self.store.fetch_by_user(applicant).await? else {
            return Ok(DecisionOutcome::AlreadyHandled);
        };
        let Some(requested) = codec::decode(record.requested.as_ref()) else {
            return Ok(DecisionOutcome::AlreadyHandled);
        };

        let granted = match subset {
            // Toggles outside the requested set carry no weight.
            Some(subset) => subset.intersect(&requested),
            None => requested,
        };
        if granted.is_empty() {
            return Err(EngineError::EmptySelection);
        }

        // Merge into the freshly fetched current set; a grant is never
        // wholesale replaced.
        let current = codec::decode(record.capabilities.as_ref()).unwrap_or_default();
        let total = current.merge(&granted);

        self.store
            .store_grant(applicant, &codec::encode(&total))
            .await?;

        self.cache.invalidate(applicant);
        self.cache
            .put(applicant, record.nickname.clone(), total.clone());

        self.notify_best_effort(
            applicant,
            Notice::AccessGranted {
                nickname: record.nickname,
                granted,
                total: total.clone(),
            },
        )
        .await;
        Ok(DecisionOutcome::Granted(total))
    }

    async fn reject(&self, applicant: UserId, reason: &str) -> Result<DecisionOutcome, EngineError> {
        let Some(record) = self.store.fetch_by_user(applicant).await? else {
            return Ok(DecisionOutcome::AlreadyHandled);
        };

        if codec::decode(record.capabilities.as_ref()).is_none() {
            // Pending initial application: the record is deleted outright,
            // leaving the nickname free for a clean re-application.
            self.store.delete_by_user(applicant).await?;
            self.cache.invalidate(applicant);
            self.notify_best_effort(
                applicant,
                Notice::ApplicationRejected {
                    nickname: record.nickname,
                    reason: reason.to_string(),
                },
            )
            .await;
            return Ok(DecisionOutcome::Rejected);
        }

        // A live grant with a pending additional request: turn down the
        // request only, the grant stays intact.
        if record.requested.is_some() {
            let current = codec::decode(record.capabilities.as_ref()).unwrap_or_default();
            self.store
                .store_grant(applicant, &codec::encode(&current))
                .await?;
            self.notify_best_effort(
                applicant,
                Notice::RequestRejected {
                    nickname: record.nickname,
                },
            )
            .await;
            return Ok(DecisionOutcome::Rejected);
        }

        Ok(DecisionOutcome::AlreadyHandled)
    }

    // --- review sessions (partial grant) ---

    /// Open a partial-grant review session. The reviewer sees only the
    /// capabilities actually requested, all unselected.
    pub async fn open_review(
        &self,
        reviewer: UserId,
        applicant: UserId,
    ) -> Result<ReviewSession, EngineError> {
        self.ensure_admin(reviewer)?;
        let Some(record) = self.store.fetch_by_user(applicant).await? else {
            return Err(EngineError::NotFound);
        };
        let Some(requested) = codec::decode(record.requested.as_ref()) else {
            return Err(EngineError::NotFound);
        };
        let session = ReviewSession {
            applicant,
            nickname: record.nickname,
            requested,
            selected: CapabilitySet::new(),
        };
        self.reviews.open(reviewer, session.clone());
        Ok(session)
    }

    /// Toggle one capability in the open session.
    pub fn toggle_review(
        &self,
        reviewer: UserId,
        capability: Capability,
    ) -> Result<ReviewSession, EngineError> {
        self.reviews
            .toggle(reviewer, capability)
            .ok_or(EngineError::NoSession)
    }

    /// Confirm the open session. Zero toggles is pushed back to the
    /// reviewer and the session stays open; otherwise this is the same
    /// merge-and-persist as a subset grant and the session is discarded.
    pub async fn confirm_review(&self, reviewer: UserId) -> Result<DecisionOutcome, EngineError> {
        let session = self.reviews.get(reviewer).ok_or(EngineError::NoSession)?;
        if session.selected.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let outcome = self
            .decide(
                reviewer,
                session.applicant,
                Decision::GrantSubset(session.selected.clone()),
            )
            .await?;
        self.reviews.cancel(reviewer);
        Ok(outcome)
    }

    /// Discard the open session; never mutates persistence.
    pub fn cancel_review(&self, reviewer: UserId) {
        self.reviews.cancel(reviewer);
    }

    // --- pending list navigation ---

    /// Snapshot the pending list for numeric picks.
    pub async fn pending_list(
        &self,
        reviewer: UserId,
    ) -> Result<Vec<(Nickname, Option<UserId>)>, EngineError> {
        self.ensure_admin(reviewer)?;
        let rows = self.store.list_pending().await?;
        self.pending.store(reviewer, rows.clone());
        Ok(rows)
    }

    /// Resolve a 1-based pick against the snapshot, revalidating that the
    /// application is still pending before the reviewer acts on it.
    pub async fn pending_pick(
        &self,
        reviewer: UserId,
        index: usize,
    ) -> Result<(Nickname, UserId), EngineError> {
        self.ensure_admin(reviewer)?;
        let Some((nickname, user)) = self.pending.pick(reviewer, index) else {
            return Err(EngineError::StaleList);
        };
        let Some(user) = user else {
            return Err(EngineError::NotFound);
        };
        match self.store.fetch_by_user(user).await? {
            Some(record) if codec::decode(record.capabilities.as_ref()).is_none() => {
                Ok((nickname, user))
            }
            _ => Err(EngineError::StaleList),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ADMIN, harness};
    use gatekeeper_store::StoreError;

    const APPLICANT: UserId = UserId::new(7);

    fn mine() -> CapabilitySet {
        CapabilitySet::of(&[Capability::Mine])
    }

    #[tokio::test]
    async fn file_then_approve_all_grants_exactly_the_requested_set() {
        let h = harness();

        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout from the north", mine())
            .await
            .unwrap();

        // The reviewer was notified with the compact-encoded request.
        let sent = h.notifier.sent_to(ADMIN);
        assert!(matches!(
            &sent[0],
            Notice::ApplicationFiled { compact, .. } if compact == "m1o0"
        ));

        let outcome = h
            .engine
            .decide(ADMIN, APPLICANT, Decision::GrantAll)
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Granted(mine()));

        assert!(h.engine.has_capability(APPLICANT, Capability::Mine).await);
        assert!(!h.engine.has_capability(APPLICANT, Capability::Oskolki).await);

        // The pending record is cleared.
        assert!(h.engine.pending_list(ADMIN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_application_validates_before_touching_the_store() {
        let h = harness();

        let err = h
            .engine
            .file_application(APPLICANT, "ivan petrov", "desc", mine())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));

        let err = h
            .engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", CapabilitySet::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::EmptySelection);

        let err = h
            .engine
            .file_application(APPLICANT, "Ivan_Petrov", "x", mine())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));

        // Nothing was persisted and nobody was notified.
        assert!(h.engine.pending_list(ADMIN).await.unwrap().is_empty());
        assert_eq!(h.notifier.count(), 0);
    }

    #[tokio::test]
    async fn duplicate_approve_resolves_softly_without_renotifying() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();

        h.engine
            .decide(ADMIN, APPLICANT, Decision::GrantAll)
            .await
            .unwrap();
        let before = h.notifier.count();

        let second = h
            .engine
            .decide(ADMIN, APPLICANT, Decision::GrantAll)
            .await
            .unwrap();
        assert_eq!(second, DecisionOutcome::AlreadyHandled);
        assert_eq!(h.notifier.count(), before);
    }

    #[tokio::test]
    async fn reject_deletes_the_record_and_allows_reapplication() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();

        let outcome = h
            .engine
            .decide(
                ADMIN,
                APPLICANT,
                Decision::Reject {
                    reason: "invalid nickname".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Rejected);

        let sent = h.notifier.sent_to(APPLICANT);
        assert!(matches!(
            &sent[0],
            Notice::ApplicationRejected { reason, .. } if reason == "invalid nickname"
        ));

        // Same nickname files cleanly again.
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn partial_grant_via_review_session() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", CapabilitySet::all())
            .await
            .unwrap();

        let session = h.engine.open_review(ADMIN, APPLICANT).await.unwrap();
        assert_eq!(session.requested, CapabilitySet::all());

        // Confirming with nothing toggled is pushed back; the session stays.
        assert_eq!(
            h.engine.confirm_review(ADMIN).await.unwrap_err(),
            EngineError::EmptySelection
        );

        h.engine.toggle_review(ADMIN, Capability::Mine).unwrap();
        let outcome = h.engine.confirm_review(ADMIN).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Granted(mine()));

        // The session is gone after confirmation.
        assert_eq!(
            h.engine.confirm_review(ADMIN).await.unwrap_err(),
            EngineError::NoSession
        );

        assert!(h.engine.has_capability(APPLICANT, Capability::Mine).await);
        assert!(!h.engine.has_capability(APPLICANT, Capability::Oskolki).await);
    }

    #[tokio::test]
    async fn confirm_after_concurrent_resolution_is_already_handled() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();

        let _ = h.engine.open_review(ADMIN, APPLICANT).await.unwrap();
        h.engine.toggle_review(ADMIN, Capability::Mine).unwrap();

        // Another action resolves the application first.
        h.engine
            .decide(ADMIN, APPLICANT, Decision::GrantAll)
            .await
            .unwrap();

        let outcome = h.engine.confirm_review(ADMIN).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::AlreadyHandled);
    }

    #[tokio::test]
    async fn ban_decision_rejects_implicitly_and_is_idempotent() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();

        let outcome = h
            .engine
            .decide(
                ADMIN,
                APPLICANT,
                Decision::Ban {
                    reason: "abuse".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Banned);

        // The pending record is gone and the user reads as capability-less.
        assert!(h.engine.pending_list(ADMIN).await.unwrap().is_empty());
        assert_eq!(h.engine.capabilities(APPLICANT).await.unwrap(), None);
        assert_eq!(h.bans.len(), 1);

        let notified = h.notifier.count();
        let again = h
            .engine
            .decide(
                ADMIN,
                APPLICANT,
                Decision::Ban {
                    reason: "abuse".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(again, DecisionOutcome::AlreadyHandled);
        assert_eq!(h.bans.len(), 1);
        assert_eq!(h.notifier.count(), notified);
    }

    #[tokio::test]
    async fn non_admin_cannot_decide() {
        let h = harness();
        let err = h
            .engine
            .decide(UserId::new(99), APPLICANT, Decision::GrantAll)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NotAdmin);
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_soft_unavailable() {
        let h = harness();
        h.access.set_failing(true);

        let err = h
            .engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn stale_pending_pick_is_reported() {
        let h = harness();
        h.engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();

        let rows = h.engine.pending_list(ADMIN).await.unwrap();
        assert_eq!(rows.len(), 1);

        // The application resolves between listing and picking.
        h.engine
            .decide(ADMIN, APPLICANT, Decision::GrantAll)
            .await
            .unwrap();

        assert_eq!(
            h.engine.pending_pick(ADMIN, 1).await.unwrap_err(),
            EngineError::StaleList
        );
        assert_eq!(
            h.engine.pending_pick(ADMIN, 5).await.unwrap_err(),
            EngineError::StaleList
        );
    }

    #[tokio::test]
    async fn banned_user_cannot_file_but_can_appeal() {
        let h = harness();
        h.engine.ban(ADMIN, APPLICANT, "abuse").await.unwrap();

        let err = h
            .engine
            .file_application(APPLICANT, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Banned);

        h.engine
            .appeal_ban(APPLICANT, "it was my brother")
            .await
            .unwrap();
        let sent = h.notifier.sent_to(ADMIN);
        assert!(sent.iter().any(|n| matches!(
            n,
            Notice::BanAppealFiled { ban_reason: Some(reason), .. } if reason == "abuse"
        )));
    }
}
