//! Log-only notifier.
//!
//! The conversational transport is a deployment-provided collaborator; this
//! default implementation traces each notice so the engine can run headless.

use async_trait::async_trait;
use tracing::info;

use gatekeeper_core::UserId;
use gatekeeper_engine::{Notice, Notifier, NotifyError};

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: UserId, notice: Notice) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(&notice).map_err(|err| NotifyError(err.to_string()))?;
        info!(%user, notice = %payload, "notice");
        Ok(())
    }
}
