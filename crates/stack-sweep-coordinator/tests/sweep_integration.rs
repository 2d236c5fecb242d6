//! End-to-end sweeps against the in-memory cloud
//!
//! Each test builds a [`FakeCloud`], runs a full [`Sweeper`] pass through
//! collection, planning, deletion and verification, and checks both the
//! returned summary and the calls the cloud received.

use stack_sweep_common::{
    CloudError, Deletion, Domain, OutcomeKind, RawRecord, ResourceKind, RunOutcome,
};
use stack_sweep_coordinator::config::{ConfigError, SweepConfig};
use stack_sweep_coordinator::inventory::RecordError;
use stack_sweep_coordinator::orchestrator::{PlanError, RunSignals, SweepError, Sweeper};
use stack_sweep_test_utils::{FakeCloud, resource_list};
use std::sync::Arc;
use std::time::Duration;

fn config(pattern: &str) -> SweepConfig {
    let mut config = SweepConfig::default();
    config.filter.pattern = pattern.to_string();
    config.execution.verify_timeout = Duration::from_secs(5);
    config.execution.poll_interval = Duration::from_secs(2);
    config
}

fn record(kind: ResourceKind, id: &str, name: &str) -> RawRecord {
    RawRecord::new(kind, id).named(name)
}

fn with_children(kind: ResourceKind, id: &str, name: &str, children: &[&str]) -> RawRecord {
    let mut record = record(kind, id, name);
    record.children = children.iter().map(|c| c.to_string()).collect();
    record
}

fn position(order: &[String], id: &str) -> usize {
    order
        .iter()
        .position(|entry| entry == id)
        .unwrap_or_else(|| panic!("{id} was never deleted"))
}

#[tokio::test(start_paused = true)]
async fn test_file_mode_only_matching_resources_are_deleted() {
    let file = resource_list(&["instances|vm-a|id1", "networks|net-a|id2"]);
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Instance, "id1", "vm-a"))
            .with_record(record(ResourceKind::Network, "id2", "net-a")),
    );
    let mut config = config(".*vm.*");
    config.source.file = Some(file.path().to_path_buf());
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    let preview = sweeper.preview().await.unwrap();
    assert_eq!(preview.plan.stages().len(), 1);
    let ids: Vec<&str> = preview.plan.flatten().map(|d| d.id()).collect();
    assert_eq!(ids, ["id1"]);

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(summary.count(Domain::Compute, OutcomeKind::Deleted), 1);
    assert_eq!(summary.outcomes().len(), 1);
    assert_eq!(summary.outcomes()[0].id, "id2");
    assert_eq!(summary.outcomes()[0].outcome, RunOutcome::SkippedNoMatch);

    // Resource lists never trigger listing calls
    assert_eq!(cloud.total_list_calls(), 0);
    assert!(!cloud.contains("id1"));
    assert!(cloud.contains("id2"));
}

#[tokio::test(start_paused = true)]
async fn test_listeners_deleted_before_their_load_balancer() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(with_children(
                ResourceKind::LoadBalancer,
                "lb1",
                "test-cluster-lb",
                &["listener1"],
            ))
            .with_record(record(ResourceKind::Listener, "listener1", "test-cluster-https")),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert!(!summary.has_failures());

    let order = cloud.delete_order();
    assert!(position(&order, "listener1") < position(&order, "lb1"));
}

#[tokio::test(start_paused = true)]
async fn test_floating_ip_pulled_ahead_of_its_instance() {
    let mut vm = record(ResourceKind::Instance, "vm-1", "test-cluster-vm");
    vm.floating_addresses = vec!["172.24.4.10".into()];
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(vm)
            .with_record(
                record(ResourceKind::FloatingIp, "fip-1", "172.24.4.10").described("test-cluster"),
            )
            .with_record(record(ResourceKind::Network, "net-1", "test-cluster-net")),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    sweeper.run(&RunSignals::new()).await.unwrap();

    assert_eq!(cloud.delete_order(), ["fip-1", "vm-1", "net-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_cycle_fails_before_any_delete() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(with_children(ResourceKind::Pool, "a", "test-cluster-a", &["b"]))
            .with_record(with_children(ResourceKind::Pool, "b", "test-cluster-b", &["a"])),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let err = sweeper.run(&RunSignals::new()).await.unwrap_err();
    match err {
        SweepError::Plan(PlanError::DependencyCycle { ids }) => assert_eq!(ids, ["a", "b"]),
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
    assert!(
        SweepError::Plan(PlanError::DependencyCycle {
            ids: vec!["a".into(), "b".into()]
        })
        .to_string()
        .starts_with("ERROR: dependency cycle detected")
    );
    assert_eq!(cloud.total_delete_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_counts_as_deleted() {
    // Listed in the file, never created in the cloud
    let file = resource_list(&["volumes|test-cluster-data|ghost"]);
    let cloud = Arc::new(FakeCloud::new());
    let mut config = config(".*test-cluster.*");
    config.source.file = Some(file.path().to_path_buf());
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(summary.count(Domain::Storage, OutcomeKind::Deleted), 1);
    assert!(!summary.has_failures());
    assert_eq!(summary.deleted()[0].id, "ghost");
    assert_eq!(summary.deletions(Deletion::AlreadyGone), 1);
    assert_eq!(cloud.delete_calls("ghost"), 1);
    // Already gone: nothing to wait for
    assert_eq!(cloud.exists_calls("ghost"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_is_idempotent() {
    let file = resource_list(&["routers|test-cluster-router|r-1"]);
    let cloud = Arc::new(
        FakeCloud::new().with_record(record(ResourceKind::Router, "r-1", "test-cluster-router")),
    );
    let mut config = config(".*test-cluster.*");
    config.source.file = Some(file.path().to_path_buf());
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    for _ in 0..2 {
        let summary = sweeper.run(&RunSignals::new()).await.unwrap();
        assert_eq!(summary.total(OutcomeKind::Deleted), 1);
        assert!(!summary.has_failures());
    }
    assert_eq!(cloud.delete_calls("r-1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_never_touches_the_cloud() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Instance, "vm-1", "test-cluster-vm"))
            .with_record(record(ResourceKind::Volume, "vol-1", "test-cluster-data"))
            .with_record(record(ResourceKind::Port, "p-1", "test-cluster-port")),
    );
    let mut config = config(".*test-cluster.*");
    config.execution.dry_run = true;
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert!(summary.is_dry_run());
    assert_eq!(summary.total(OutcomeKind::Deleted), 3);
    assert_eq!(summary.deleted().len(), 3);
    assert!(
        summary
            .deleted()
            .iter()
            .all(|r| r.outcome == RunOutcome::Deleted(Deletion::Simulated))
    );
    assert_eq!(summary.deletions(Deletion::Simulated), 3);
    assert_eq!(cloud.total_delete_calls(), 0);
    assert_eq!(cloud.total_exists_calls(), 0);
    assert!(cloud.contains("vm-1"));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_resource_times_out_within_poll_budget() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Volume, "vol-1", "test-cluster-data"))
            .stuck("vol-1"),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    let failures: Vec<_> = summary.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].outcome, RunOutcome::VerifyTimeout);
    // timeout 5s, interval 2s
    assert!(cloud.exists_calls("vol-1") <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_teardown_is_verified() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Image, "img-1", "test-cluster-image"))
            .linger("img-1", 1),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(summary.total(OutcomeKind::Deleted), 1);
    assert_eq!(cloud.exists_calls("img-1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_stop_later_stages() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Router, "r-1", "test-cluster-router"))
            .with_record(record(ResourceKind::Port, "p-1", "test-cluster-port"))
            .with_record(record(ResourceKind::Volume, "vol-1", "test-cluster-data"))
            .fail_delete("r-1", CloudError::Conflict("router has interfaces".into()))
            .fail_exists("vol-1", CloudError::Unauthorized("token expired".into())),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(summary.total(OutcomeKind::DeleteFailed), 1);
    assert_eq!(summary.total(OutcomeKind::VerifyError), 1);
    assert_eq!(summary.count(Domain::Network, OutcomeKind::Deleted), 1);
    assert!(!cloud.contains("p-1"));
    // Not retried at the orchestrator level
    assert_eq!(cloud.delete_calls("r-1"), 1);

    let reasons: Vec<_> = summary.failures().filter_map(|r| r.outcome.reason()).collect();
    assert!(reasons.iter().any(|r| r.contains("router has interfaces")));
    assert!(reasons.iter().any(|r| r.contains("token expired")));
}

#[tokio::test(start_paused = true)]
async fn test_strict_mode_rejects_malformed_lines() {
    let lines = [
        "instances|test-cluster-vm|1111",
        "instances|missing-id",
        "networks|test-cluster-net|2222",
    ];
    let cloud = Arc::new(FakeCloud::new());

    let lenient_file = resource_list(&lines);
    let mut lenient = config(".*test-cluster.*");
    lenient.source.file = Some(lenient_file.path().to_path_buf());
    let summary = Sweeper::new(lenient, cloud.clone())
        .unwrap()
        .run(&RunSignals::new())
        .await
        .unwrap();
    assert_eq!(summary.warnings().len(), 1);
    assert_eq!(summary.total(OutcomeKind::Deleted), 2);

    let strict_file = resource_list(&lines);
    let mut strict = config(".*test-cluster.*");
    strict.source.file = Some(strict_file.path().to_path_buf());
    strict.source.strict = true;
    let calls_before = cloud.total_delete_calls();
    let err = Sweeper::new(strict, cloud.clone())
        .unwrap()
        .run(&RunSignals::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SweepError::Record(RecordError::FieldCount { line: 2, found: 2 })
    ));
    assert_eq!(cloud.total_delete_calls(), calls_before);
}

#[tokio::test(start_paused = true)]
async fn test_missing_resource_list_is_a_config_error() {
    let cloud = Arc::new(FakeCloud::new());
    let mut config = config(".*");
    config.source.file = Some("/nonexistent/resources.txt".into());
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    let err = sweeper.run(&RunSignals::new()).await.unwrap_err();
    assert!(matches!(
        err,
        SweepError::Config(ConfigError::UnreadableFile { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_run_cancels_everything() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Instance, "vm-1", "test-cluster-vm"))
            .with_record(record(ResourceKind::Subnet, "s-1", "test-cluster-subnet")),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let signals = RunSignals::new();
    signals.stop();
    let summary = sweeper.run(&signals).await.unwrap();

    assert_eq!(summary.total(OutcomeKind::SkippedCancelled), 2);
    assert_eq!(cloud.total_delete_calls(), 0);
    assert!(!summary.has_failures());
}

#[tokio::test(start_paused = true)]
async fn test_abort_ends_verification_wait() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Volume, "vol-1", "test-cluster-data"))
            .with_record(record(ResourceKind::Network, "net-1", "test-cluster-net"))
            .stuck("vol-1"),
    );
    let mut config = config(".*test-cluster.*");
    config.execution.verify_timeout = Duration::from_secs(600);
    let sweeper = Sweeper::new(config, cloud.clone()).unwrap();

    let signals = RunSignals::new();
    let handler = signals.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        handler.abort();
    });

    let summary = sweeper.run(&signals).await.unwrap();
    let failures: Vec<_> = summary.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].outcome,
        RunOutcome::VerifyError("verification aborted".into())
    );
    // The later network stage never started
    assert_eq!(summary.total(OutcomeKind::SkippedCancelled), 1);
    assert_eq!(cloud.delete_calls("net-1"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stage_results_sorted_by_id() {
    // Flavors, keypairs and images share a stage; members are ordered by kind first
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Flavor, "f-9", "test-cluster-flavor"))
            .with_record(record(ResourceKind::Keypair, "k-5", "test-cluster-key"))
            .with_record(record(ResourceKind::Image, "a-1", "test-cluster-image"))
            .fail_delete("f-9", CloudError::Conflict("in use".into()))
            .fail_delete("k-5", CloudError::Conflict("in use".into()))
            .fail_delete("a-1", CloudError::Conflict("in use".into())),
    );

    for concurrency in [1, 3] {
        let mut config = config(".*test-cluster.*");
        config.execution.concurrency = concurrency;
        let summary = Sweeper::new(config, cloud.clone())
            .unwrap()
            .run(&RunSignals::new())
            .await
            .unwrap();

        let ids: Vec<&str> = summary.outcomes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-1", "f-9", "k-5"], "concurrency {concurrency}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_cap_overlaps_deletes_within_a_stage() {
    let mut cloud = FakeCloud::new().with_delete_latency(Duration::from_secs(1));
    for i in 0..6 {
        cloud = cloud.with_record(record(
            ResourceKind::Volume,
            &format!("vol-{i}"),
            "test-cluster-data",
        ));
    }
    let cloud = Arc::new(cloud);

    let mut config = config(".*test-cluster.*");
    config.execution.concurrency = 3;
    let summary = Sweeper::new(config, cloud.clone())
        .unwrap()
        .run(&RunSignals::new())
        .await
        .unwrap();

    assert_eq!(summary.total(OutcomeKind::Deleted), 6);
    assert!(cloud.max_concurrent_deletes() > 1);
    assert!(cloud.max_concurrent_deletes() <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_by_default() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_delete_latency(Duration::from_secs(1))
            .with_record(record(ResourceKind::Volume, "vol-1", "test-cluster-a"))
            .with_record(record(ResourceKind::Volume, "vol-2", "test-cluster-b")),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(cloud.max_concurrent_deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unlistable_domain_is_skipped() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(record(ResourceKind::Instance, "vm-1", "test-cluster-vm"))
            .with_record(record(ResourceKind::DnsZone, "z-1", "test-cluster.example.com."))
            .fail_listing(Domain::Dns),
    );
    let sweeper = Sweeper::new(config(".*test-cluster.*"), cloud.clone()).unwrap();

    let summary = sweeper.run(&RunSignals::new()).await.unwrap();
    assert_eq!(summary.skipped_domains().len(), 1);
    assert_eq!(summary.skipped_domains()[0].domain, Domain::Dns);
    assert_eq!(
        summary.count(Domain::Compute, OutcomeKind::Deleted),
        1,
        "other domains still cleaned"
    );
    assert!(cloud.contains("z-1"));
}

#[tokio::test(start_paused = true)]
async fn test_description_match_and_summary_json() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_record(
                record(ResourceKind::SecurityGroup, "sg-1", "web").described("created by test-cluster"),
            )
            .with_record(record(ResourceKind::SecurityGroup, "sg-2", "prod").described("")),
    );
    let mut config = config(".*test-cluster.*");
    config.execution.verify = false;
    let summary = Sweeper::new(config, cloud.clone())
        .unwrap()
        .run(&RunSignals::new())
        .await
        .unwrap();

    assert!(!cloud.contains("sg-1"));
    assert!(cloud.contains("sg-2"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    summary.write_json(&path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["outcomes"][0]["id"], "sg-2");
    assert_eq!(json["outcomes"][0]["outcome"], "SKIPPED_NO_MATCH");
    assert_eq!(json["dry_run"], false);

    // Unverified deletes still count as deleted
    assert_eq!(summary.total(OutcomeKind::Deleted), 1);
    assert_eq!(cloud.total_exists_calls(), 0);
}
