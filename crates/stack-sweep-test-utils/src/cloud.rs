//! Scripted in-memory cloud
//!
//! [`FakeCloud`] implements [`CloudClient`] over a list of raw records and
//! lets tests script failures, slow disappearance and latency, then inspect
//! every call that was made.

use async_trait::async_trait;
use stack_sweep_common::{CloudClient, CloudError, Domain, RawRecord, ResourceDescriptor, ResourceKind};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    records: Vec<RawRecord>,
    alive: HashSet<String>,
    linger: HashMap<String, u32>,
    stuck: HashSet<String>,
    failing_domains: HashSet<Domain>,
    delete_errors: HashMap<String, CloudError>,
    exists_errors: HashMap<String, CloudError>,
    delete_latency: Duration,

    list_calls: usize,
    delete_calls: HashMap<String, usize>,
    exists_calls: HashMap<String, usize>,
    delete_order: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory [`CloudClient`] for tests
///
/// Resources are keyed by id alone; tests should use ids that are unique
/// across kinds.
///
/// # Example
///
/// ```
/// use stack_sweep_common::{RawRecord, ResourceKind};
/// use stack_sweep_test_utils::FakeCloud;
///
/// let cloud = FakeCloud::new()
///     .with_record(RawRecord::new(ResourceKind::Instance, "vm-1").named("test-cluster-vm"))
///     .linger("vm-1", 2);
/// assert!(cloud.contains("vm-1"));
/// ```
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a live resource
    pub fn with_record(self, record: RawRecord) -> Self {
        self.insert(record);
        self
    }

    /// Create a resource after construction, as another actor would
    pub fn insert(&self, record: RawRecord) {
        let mut state = self.state();
        state.alive.insert(record.id.clone());
        state.records.push(record);
    }

    /// Add a live resource matching a descriptor
    pub fn with_descriptor(self, descriptor: &ResourceDescriptor) -> Self {
        let mut record = RawRecord::new(descriptor.kind(), descriptor.id()).named(descriptor.name());
        record.description = descriptor.description().map(str::to_string);
        self.with_record(record)
    }

    /// Make `list` fail for a whole domain
    pub fn fail_listing(self, domain: Domain) -> Self {
        self.state().failing_domains.insert(domain);
        self
    }

    /// Make every delete of `id` fail with `error`
    pub fn fail_delete(self, id: &str, error: CloudError) -> Self {
        self.state().delete_errors.insert(id.to_string(), error);
        self
    }

    /// Make every existence check of `id` fail with `error`
    pub fn fail_exists(self, id: &str, error: CloudError) -> Self {
        self.state().exists_errors.insert(id.to_string(), error);
        self
    }

    /// Keep reporting `id` as present for `polls` checks after it is deleted
    pub fn linger(self, id: &str, polls: u32) -> Self {
        self.state().linger.insert(id.to_string(), polls);
        self
    }

    /// Accept deletes of `id` but never let it disappear
    pub fn stuck(self, id: &str) -> Self {
        self.state().stuck.insert(id.to_string());
        self
    }

    /// Delay every delete call, to observe overlapping requests
    pub fn with_delete_latency(self, latency: Duration) -> Self {
        self.state().delete_latency = latency;
        self
    }

    /// Delete `id` out of band, as another actor would
    pub fn remove(&self, id: &str) {
        let mut state = self.state();
        state.alive.remove(id);
        state.records.retain(|r| r.id != id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().alive.contains(id)
    }

    pub fn total_list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn delete_calls(&self, id: &str) -> usize {
        self.state().delete_calls.get(id).copied().unwrap_or(0)
    }

    pub fn total_delete_calls(&self) -> usize {
        self.state().delete_calls.values().sum()
    }

    pub fn exists_calls(&self, id: &str) -> usize {
        self.state().exists_calls.get(id).copied().unwrap_or(0)
    }

    pub fn total_exists_calls(&self) -> usize {
        self.state().exists_calls.values().sum()
    }

    /// Ids in the order delete calls were received
    pub fn delete_order(&self) -> Vec<String> {
        self.state().delete_order.clone()
    }

    /// Highest number of delete calls that overlapped in time
    pub fn max_concurrent_deletes(&self) -> usize {
        self.state().max_in_flight
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn list(&self, domain: Domain) -> Result<Vec<RawRecord>, CloudError> {
        let mut state = self.state();
        state.list_calls += 1;
        if state.failing_domains.contains(&domain) {
            return Err(CloudError::Unavailable(format!("{domain} endpoint is down")));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.kind.domain() == domain)
            .cloned()
            .collect())
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CloudError> {
        let latency = {
            let mut state = self.state();
            *state.delete_calls.entry(id.to_string()).or_default() += 1;
            state.delete_order.push(id.to_string());
            if let Some(error) = state.delete_errors.get(id) {
                return Err(error.clone());
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.delete_latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.in_flight -= 1;
        if !state.alive.contains(id) {
            return Err(CloudError::NotFound(format!("{kind} {id}")));
        }
        if !state.stuck.contains(id) {
            state.alive.remove(id);
            state.records.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn exists(&self, _kind: ResourceKind, id: &str) -> Result<bool, CloudError> {
        let mut state = self.state();
        *state.exists_calls.entry(id.to_string()).or_default() += 1;
        if let Some(error) = state.exists_errors.get(id) {
            return Err(error.clone());
        }
        if state.alive.contains(id) {
            return Ok(true);
        }
        match state.linger.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let cloud = FakeCloud::new().with_record(RawRecord::new(ResourceKind::Router, "r-1"));

        assert!(cloud.delete(ResourceKind::Router, "r-1").await.is_ok());
        let err = cloud.delete(ResourceKind::Router, "r-1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cloud.delete_calls("r-1"), 2);
        assert!(cloud.list(Domain::Network).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_linger_counts_down() {
        let cloud = FakeCloud::new()
            .with_record(RawRecord::new(ResourceKind::Volume, "v-1"))
            .linger("v-1", 1);
        cloud.remove("v-1");

        assert!(cloud.exists(ResourceKind::Volume, "v-1").await.unwrap());
        assert!(!cloud.exists(ResourceKind::Volume, "v-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_stuck_never_disappears() {
        let cloud = FakeCloud::new()
            .with_record(RawRecord::new(ResourceKind::Port, "p-1"))
            .stuck("p-1");

        cloud.delete(ResourceKind::Port, "p-1").await.unwrap();
        assert!(cloud.exists(ResourceKind::Port, "p-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_by_domain() {
        let cloud = FakeCloud::new()
            .with_record(RawRecord::new(ResourceKind::Instance, "vm-1"))
            .with_record(RawRecord::new(ResourceKind::Network, "net-1"))
            .fail_listing(Domain::Dns);

        assert_eq!(cloud.list(Domain::Compute).await.unwrap().len(), 1);
        assert!(cloud.list(Domain::Dns).await.is_err());
        assert_eq!(cloud.total_list_calls(), 2);
    }
}
