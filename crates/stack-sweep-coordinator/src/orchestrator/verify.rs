//! Completion verification
//!
//! Deletes are asynchronous on most services: an accepted request only means
//! the resource entered a deleting state. The verifier polls for absence.

use crate::wait::{PollConfig, WaitOutcome, wait_for_resource};
use stack_sweep_common::{CloudClient, Deletion, ResourceDescriptor, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Reason recorded when an abort signal ends a wait
pub const ABORTED_REASON: &str = "verification aborted";

/// Polls the cloud until a deleted resource disappears
#[derive(Clone)]
pub struct CompletionVerifier {
    client: Arc<dyn CloudClient>,
    poll: PollConfig,
}

impl CompletionVerifier {
    pub fn new(client: Arc<dyn CloudClient>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            client,
            poll: PollConfig::new(timeout, poll_interval),
        }
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Wait for `descriptor` to disappear
    ///
    /// A resource stuck in an error state looks the same as a slow one and
    /// ends as `VerifyTimeout`.
    pub async fn verify(
        &self,
        descriptor: &ResourceDescriptor,
        abort: Option<&CancellationToken>,
    ) -> RunOutcome {
        let kind = descriptor.kind();
        let id = descriptor.id();
        let client = &self.client;

        let result = wait_for_resource(
            &self.poll,
            abort,
            || async move { client.exists(kind, id).await.map(|present| !present) },
            descriptor.display_name(),
        )
        .await;

        match result {
            Ok(WaitOutcome::Ready { .. }) => RunOutcome::Deleted(Deletion::Verified),
            Ok(WaitOutcome::Exhausted { attempts }) => {
                warn!(
                    %kind,
                    %id,
                    attempts,
                    timeout_secs = self.poll.timeout.as_secs_f64(),
                    "Still present after verification timeout"
                );
                RunOutcome::VerifyTimeout
            }
            Ok(WaitOutcome::Cancelled { .. }) => {
                warn!(%kind, %id, "Verification aborted");
                RunOutcome::VerifyError(ABORTED_REASON.to_string())
            }
            Err(e) => RunOutcome::VerifyError(e.to_string()),
        }
    }
}

impl std::fmt::Debug for CompletionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionVerifier")
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
