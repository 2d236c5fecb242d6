//! Main orchestration logic for cleanup runs
//!
//! The [`Sweeper`] drives one run: collect every domain, filter, plan the
//! deletion order, then delete and verify stage by stage and summarize.
//! Per-resource failures are recorded and never abort the run; only
//! configuration problems (see [`SweepError`]) do, and always before the
//! first delete.

pub mod executor;
pub mod plan;
pub mod report;
pub mod types;
pub mod verify;

// Re-export core types
pub use executor::DeletionExecutor;
pub use plan::{Plan, PlanError, Stage};
pub use report::{OutcomeRecord, RunSummary, SkippedDomain, summarize};
pub use types::{Preview, RunSignals, SweepError};
pub use verify::CompletionVerifier;

use crate::config::{ConfigError, SweepConfig};
use crate::filter::ResourceFilter;
use crate::inventory::{CollectError, Collector};
use futures::stream::{self, StreamExt};
use stack_sweep_common::{CloudClient, Deletion, Domain, ResourceDescriptor, RunOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs cleanups for one configuration
pub struct Sweeper {
    config: SweepConfig,
    filter: ResourceFilter,
    collector: Collector,
    executor: DeletionExecutor,
    verifier: Option<CompletionVerifier>,
}

impl Sweeper {
    /// Validate `config` and wire the components around `client`
    ///
    /// In file mode the client is only used for deletes and verification.
    pub fn new(config: SweepConfig, client: Arc<dyn CloudClient>) -> Result<Self, SweepError> {
        config.validate()?;
        let filter = ResourceFilter::new(config.pattern())?;

        let collector = match &config.source.file {
            Some(path) => Collector::from_file(path),
            None => Collector::live(client.clone()),
        };
        let executor = DeletionExecutor::new(client.clone(), config.dry_run());
        let verifier = (config.execution.verify && !config.dry_run()).then(|| {
            CompletionVerifier::new(
                client,
                config.execution.verify_timeout,
                config.execution.poll_interval,
            )
        });

        Ok(Self {
            config,
            filter,
            collector,
            executor,
            verifier,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Collect, filter and plan without deleting anything
    pub async fn preview(&self) -> Result<Preview, SweepError> {
        let mut summary = RunSummary::new(self.config.dry_run());
        let mut candidates: Vec<ResourceDescriptor> = Vec::new();

        for domain in Domain::ALL {
            let inventory = match self.collector.collect(domain).await {
                Ok(inventory) => inventory,
                Err(CollectError::Unreadable { path, source }) => {
                    return Err(ConfigError::UnreadableFile { path, source }.into());
                }
                Err(CollectError::Listing { source, .. }) => {
                    warn!(%domain, error = %source, "Skipping domain");
                    summary.skip_domain(domain, source.to_string());
                    continue;
                }
            };

            for item in inventory {
                match item {
                    Ok(descriptor) if self.filter.matches(&descriptor) => {
                        candidates.push(descriptor);
                    }
                    Ok(descriptor) => summary.record(&descriptor, RunOutcome::SkippedNoMatch),
                    Err(error) if self.config.source.strict => return Err(error.into()),
                    Err(error) => {
                        warn!(%domain, %error, "Skipping record");
                        summary.warn(error.to_string());
                    }
                }
            }
        }

        info!(
            matched = candidates.len(),
            pattern = %self.filter.pattern(),
            "Resources selected for cleanup"
        );

        let plan = plan::plan(candidates)?;
        Ok(Preview { plan, summary })
    }

    /// Perform a full run: [`preview`](Self::preview), then
    /// [`execute`](Self::execute)
    ///
    /// Returns `Err` only for configuration problems detected before the
    /// first delete; everything else is reported in the summary.
    pub async fn run(&self, signals: &RunSignals) -> Result<RunSummary, SweepError> {
        let preview = self.preview().await?;
        Ok(self.execute(preview, signals).await)
    }

    /// Delete and verify exactly the resources planned in `preview`
    ///
    /// The cloud is not listed again, so resources that started matching
    /// after the preview are left alone.
    pub async fn execute(&self, preview: Preview, signals: &RunSignals) -> RunSummary {
        let Preview { plan, mut summary } = preview;
        info!(
            stages = plan.stages().len(),
            resources = plan.resource_count(),
            dry_run = self.config.dry_run(),
            "Starting cleanup"
        );

        for stage in plan.into_stages() {
            if signals.is_stopped() {
                for descriptor in &stage.members {
                    summary.record(descriptor, RunOutcome::SkippedCancelled);
                }
                continue;
            }

            info!(
                stage = stage.stage,
                micro = stage.micro,
                kinds = %stage.kinds_label(),
                count = stage.members.len(),
                "Cleaning stage"
            );
            for (descriptor, outcome) in self.run_stage(stage.members, signals).await {
                summary.record(&descriptor, outcome);
            }
        }

        if signals.is_stopped() {
            warn!("Run interrupted; remaining resources were not deleted");
        }
        summary.finish();
        summary
    }

    /// Delete and verify one stage, at most `concurrency` resources at a time
    ///
    /// Deletes are issued in plan order (kind rank, then id) but results are
    /// reported by id alone, whatever order they completed in.
    async fn run_stage(
        &self,
        members: Vec<ResourceDescriptor>,
        signals: &RunSignals,
    ) -> Vec<(ResourceDescriptor, RunOutcome)> {
        let mut results: Vec<(ResourceDescriptor, RunOutcome)> = stream::iter(members)
            .map(|descriptor| async move {
                let outcome = self.process(&descriptor, signals).await;
                (descriptor, outcome)
            })
            .buffer_unordered(self.config.execution.concurrency)
            .collect()
            .await;

        results.sort_by(|(a, _), (b, _)| a.id().cmp(b.id()));
        results
    }

    async fn process(&self, descriptor: &ResourceDescriptor, signals: &RunSignals) -> RunOutcome {
        if signals.is_stopped() {
            return RunOutcome::SkippedCancelled;
        }

        let outcome = self.executor.delete(descriptor).await;
        match (outcome, &self.verifier) {
            (RunOutcome::Deleted(Deletion::Unverified), Some(verifier)) => {
                verifier.verify(descriptor, Some(&signals.abort)).await
            }
            (outcome, _) => outcome,
        }
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("config", &self.config)
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_sweep_common::{RawRecord, ResourceKind};
    use stack_sweep_test_utils::FakeCloud;
    use std::time::Duration;

    fn config() -> SweepConfig {
        let mut config = SweepConfig::default();
        config.execution.verify_timeout = Duration::from_secs(5);
        config.execution.poll_interval = Duration::from_secs(2);
        config
    }

    #[test]
    fn test_invalid_pattern_rejected_before_listing() {
        let cloud = Arc::new(FakeCloud::new());
        let mut config = config();
        config.filter.pattern = "[".into();

        let err = Sweeper::new(config, cloud.clone()).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Config(ConfigError::InvalidPattern { .. })
        ));
        assert_eq!(cloud.total_list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_does_not_delete() {
        let cloud = Arc::new(
            FakeCloud::new()
                .with_record(RawRecord::new(ResourceKind::Instance, "vm-1").named("test-cluster-vm"))
                .with_record(RawRecord::new(ResourceKind::Instance, "vm-2").named("prod-vm")),
        );
        let sweeper = Sweeper::new(config(), cloud.clone()).unwrap();

        let preview = sweeper.preview().await.unwrap();
        assert_eq!(preview.plan.resource_count(), 1);
        assert_eq!(preview.summary.outcomes().len(), 1);
        assert_eq!(preview.summary.outcomes()[0].id, "vm-2");
        assert_eq!(cloud.total_delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_only_deletes_previewed_resources() {
        let cloud = Arc::new(
            FakeCloud::new()
                .with_record(RawRecord::new(ResourceKind::Volume, "v-1").named("test-cluster-data")),
        );
        let sweeper = Sweeper::new(config(), cloud.clone()).unwrap();

        let preview = sweeper.preview().await.unwrap();
        cloud.insert(RawRecord::new(ResourceKind::Volume, "v-2").named("test-cluster-late"));

        let summary = sweeper.execute(preview, &RunSignals::new()).await;
        assert_eq!(summary.deleted().len(), 1);
        assert_eq!(summary.deleted()[0].id, "v-1");
        assert_eq!(cloud.delete_calls("v-2"), 0);
        assert!(cloud.contains("v-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_verify_reports_unverified() {
        let cloud = Arc::new(
            FakeCloud::new()
                .with_record(RawRecord::new(ResourceKind::Volume, "v-1").named("test-cluster-data")),
        );
        let mut config = config();
        config.execution.verify = false;
        let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

        let summary = sweeper.run(&RunSignals::new()).await.unwrap();
        assert_eq!(summary.total(stack_sweep_common::OutcomeKind::Deleted), 1);
        assert_eq!(summary.deletions(Deletion::Unverified), 1);
        assert_eq!(cloud.total_exists_calls(), 0);
    }
}
