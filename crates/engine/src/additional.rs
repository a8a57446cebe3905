//! Additional-access workflow: extending an existing grant.
//!
//! Entry requires the user to already hold at least one capability and to
//! be missing at least one. The reviewer's decision merges into the current
//! grant; this path can only add, never revoke.

use gatekeeper_core::{Capability, CapabilitySet, DomainError, UserId, codec};

use crate::error::EngineError;
use crate::notify::Notice;
use crate::service::AccessEngine;

impl AccessEngine {
    /// Capabilities the user could still request.
    pub async fn list_missing(&self, user: UserId) -> Result<Vec<Capability>, EngineError> {
        let Some(current) = self.capabilities(user).await? else {
            return Err(EngineError::NoAccess);
        };
        Ok(current.missing())
    }

    /// File a request for capabilities on top of an existing grant.
    ///
    /// The request marker lives beside the grant; filing never touches the
    /// granted set.
    pub async fn file_additional_request(
        &self,
        user: UserId,
        requested: CapabilitySet,
    ) -> Result<(), EngineError> {
        if self.bans.is_banned(user) {
            return Err(EngineError::Banned);
        }
        let Some(current) = self.capabilities(user).await? else {
            return Err(EngineError::NoAccess);
        };
        if current.missing().is_empty() {
            return Err(EngineError::NothingMissing);
        }
        if requested.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        if !requested.intersect(&current).is_empty() {
            return Err(DomainError::validation("requested capabilities already granted").into());
        }
        let Some(nickname) = self.approved_nickname(user).await? else {
            return Err(EngineError::NoAccess);
        };

        self.store
            .store_requested(user, &codec::encode(&requested))
            .await?;

        let compact = requested.compact();
        self.notify_best_effort(
            self.config.admin,
            Notice::AdditionalRequested {
                applicant: user,
                nickname,
                requested,
                compact,
            },
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::Decision;
    use crate::error::DecisionOutcome;
    use crate::testutil::{ADMIN, harness};
    use gatekeeper_store::AccessStore;

    const USER: UserId = UserId::new(7);

    fn mine() -> CapabilitySet {
        CapabilitySet::of(&[Capability::Mine])
    }

    fn oskolki() -> CapabilitySet {
        CapabilitySet::of(&[Capability::Oskolki])
    }

    async fn grant_mine(h: &crate::testutil::TestHarness) {
        h.engine
            .file_application(USER, "Ivan_Petrov", "scout", mine())
            .await
            .unwrap();
        h.engine
            .decide(ADMIN, USER, Decision::GrantAll)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_missing_is_the_complement_of_the_grant() {
        let h = harness();
        grant_mine(&h).await;

        assert_eq!(
            h.engine.list_missing(USER).await.unwrap(),
            vec![Capability::Oskolki]
        );

        // No grant at all: entry precondition fails.
        assert_eq!(
            h.engine.list_missing(UserId::new(8)).await.unwrap_err(),
            EngineError::NoAccess
        );
    }

    #[tokio::test]
    async fn additional_approval_merges_and_never_drops_existing_grants() {
        let h = harness();
        grant_mine(&h).await;

        h.engine
            .file_additional_request(USER, oskolki())
            .await
            .unwrap();

        // The grant column is untouched while the request is pending.
        assert_eq!(h.engine.capabilities(USER).await.unwrap(), Some(mine()));

        let outcome = h
            .engine
            .decide(ADMIN, USER, Decision::GrantAll)
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Granted(CapabilitySet::all()));

        assert!(h.engine.has_capability(USER, Capability::Mine).await);
        assert!(h.engine.has_capability(USER, Capability::Oskolki).await);
    }

    #[tokio::test]
    async fn reviewer_subset_selection_merges_into_current_grant() {
        let h = harness();
        grant_mine(&h).await;
        h.engine
            .file_additional_request(USER, oskolki())
            .await
            .unwrap();

        let session = h.engine.open_review(ADMIN, USER).await.unwrap();
        assert_eq!(session.requested, oskolki());

        h.engine.toggle_review(ADMIN, Capability::Oskolki).unwrap();
        let outcome = h.engine.confirm_review(ADMIN).await.unwrap();
        assert_eq!(outcome, DecisionOutcome::Granted(CapabilitySet::all()));
    }

    #[tokio::test]
    async fn rejecting_an_additional_request_keeps_the_grant() {
        let h = harness();
        grant_mine(&h).await;
        h.engine
            .file_additional_request(USER, oskolki())
            .await
            .unwrap();

        let outcome = h
            .engine
            .decide(
                ADMIN,
                USER,
                Decision::Reject {
                    reason: "not yet".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Rejected);

        // Existing grant intact, request marker cleared.
        assert_eq!(h.engine.capabilities(USER).await.unwrap(), Some(mine()));
        let record = h.access.fetch_by_user(USER).await.unwrap().unwrap();
        assert_eq!(record.requested, None);
    }

    #[tokio::test]
    async fn request_validation() {
        let h = harness();
        grant_mine(&h).await;

        // Empty selection.
        assert_eq!(
            h.engine
                .file_additional_request(USER, CapabilitySet::new())
                .await
                .unwrap_err(),
            EngineError::EmptySelection
        );

        // Requesting something already held.
        assert!(matches!(
            h.engine
                .file_additional_request(USER, mine())
                .await
                .unwrap_err(),
            EngineError::Domain(_)
        ));

        // Nothing missing once everything is granted.
        h.engine
            .file_additional_request(USER, oskolki())
            .await
            .unwrap();
        h.engine
            .decide(ADMIN, USER, Decision::GrantAll)
            .await
            .unwrap();
        assert_eq!(
            h.engine
                .file_additional_request(USER, oskolki())
                .await
                .unwrap_err(),
            EngineError::NothingMissing
        );
    }
}
