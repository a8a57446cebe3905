//! Collaborator interface to the conversational transport.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use gatekeeper_core::{Capability, CapabilitySet, Nickname, UserId};

/// Structured notification content; the transport renders it.
///
/// The variants that drive a reviewer's follow-up action carry the set in
/// compact form so the action can be correlated without a store round-trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    ApplicationFiled {
        applicant: UserId,
        nickname: Nickname,
        description: String,
        requested: CapabilitySet,
        compact: String,
    },
    AdditionalRequested {
        applicant: UserId,
        nickname: Nickname,
        requested: CapabilitySet,
        compact: String,
    },
    AccessGranted {
        nickname: Nickname,
        /// What this decision added.
        granted: CapabilitySet,
        /// The full set the user now holds.
        total: CapabilitySet,
    },
    ApplicationRejected {
        nickname: Nickname,
        reason: String,
    },
    /// An additional-access request was turned down; the grant is intact.
    RequestRejected {
        nickname: Nickname,
    },
    Banned {
        reason: String,
    },
    BanRecorded {
        user: UserId,
        reason: String,
    },
    BanLifted,
    BanAppealFiled {
        applicant: UserId,
        ban_reason: Option<String>,
        text: String,
    },
    SuggestionFiled {
        nickname: Nickname,
        capability: Capability,
        text: String,
    },
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery seam to the conversational transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notice` to `user`. Best effort: after a durable mutation
    /// the engine logs a failure and moves on, never rolls back.
    async fn notify(&self, user: UserId, notice: Notice) -> Result<(), NotifyError>;
}
