//! Single delete requests
//!
//! Exactly one request per descriptor; no retries. A "not found" answer
//! means someone (or a cascade) got there first and counts as success.

use stack_sweep_common::{CloudClient, Deletion, ResourceDescriptor, RunOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Issues delete requests through the cloud client
#[derive(Clone)]
pub struct DeletionExecutor {
    client: Arc<dyn CloudClient>,
    dry_run: bool,
}

impl DeletionExecutor {
    pub fn new(client: Arc<dyn CloudClient>, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete one resource
    ///
    /// Returns `Deleted(Unverified)` when the request was accepted; the
    /// caller decides whether to verify.
    pub async fn delete(&self, descriptor: &ResourceDescriptor) -> RunOutcome {
        let kind = descriptor.kind();
        let id = descriptor.id();

        if self.dry_run {
            info!(%kind, %id, name = %descriptor.display_name(), "[DRY RUN] Would delete");
            return RunOutcome::Deleted(Deletion::Simulated);
        }

        match self.client.delete(kind, id).await {
            Ok(()) => {
                info!(%kind, %id, name = %descriptor.display_name(), "Delete requested");
                RunOutcome::Deleted(Deletion::Unverified)
            }
            Err(e) if e.is_not_found() => {
                info!(%kind, %id, "Not found (already deleted?)");
                RunOutcome::Deleted(Deletion::AlreadyGone)
            }
            Err(e) => {
                warn!(%kind, %id, error = %e, "Failed to delete");
                RunOutcome::DeleteFailed(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for DeletionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionExecutor")
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_sweep_common::{CloudError, ResourceKind};
    use stack_sweep_test_utils::FakeCloud;

    fn net() -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::Network, "test-cluster-net", "net-1")
    }

    #[tokio::test]
    async fn test_accepted_delete_is_unverified() {
        let cloud = Arc::new(FakeCloud::new().with_descriptor(&net()));
        let executor = DeletionExecutor::new(cloud.clone(), false);

        let outcome = executor.delete(&net()).await;
        assert_eq!(outcome, RunOutcome::Deleted(Deletion::Unverified));
        assert_eq!(cloud.delete_calls("net-1"), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_deleted() {
        let cloud = Arc::new(FakeCloud::new());
        let executor = DeletionExecutor::new(cloud.clone(), false);

        let outcome = executor.delete(&net()).await;
        assert_eq!(outcome, RunOutcome::Deleted(Deletion::AlreadyGone));
        assert_eq!(cloud.delete_calls("net-1"), 1);
    }

    #[tokio::test]
    async fn test_error_is_delete_failed() {
        let cloud = Arc::new(
            FakeCloud::new()
                .with_descriptor(&net())
                .fail_delete("net-1", CloudError::Conflict("network has active ports".into())),
        );
        let executor = DeletionExecutor::new(cloud.clone(), false);

        let outcome = executor.delete(&net()).await;
        assert_eq!(
            outcome,
            RunOutcome::DeleteFailed("Conflict: network has active ports".into())
        );
        // No retries
        assert_eq!(cloud.delete_calls("net-1"), 1);
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_cloud() {
        let cloud = Arc::new(FakeCloud::new().with_descriptor(&net()));
        let executor = DeletionExecutor::new(cloud.clone(), true);

        let outcome = executor.delete(&net()).await;
        assert_eq!(outcome, RunOutcome::Deleted(Deletion::Simulated));
        assert_eq!(cloud.total_delete_calls(), 0);
        assert!(cloud.contains("net-1"));
    }
}
