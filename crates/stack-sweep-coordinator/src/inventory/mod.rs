//! Inventory collection
//!
//! Turns live listings or resource list files into [`ResourceDescriptor`]s,
//! one domain at a time. Each [`Collector::collect`] call re-queries the
//! cloud (or re-reads the file) and returns a fresh, lazily translated
//! [`Inventory`].

pub mod file;

use stack_sweep_common::defaults::SYSTEM_PORT_OWNERS;
use stack_sweep_common::{
    CloudClient, CloudError, Domain, RawRecord, ResourceDescriptor, ResourceKind,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A single unusable record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("line {line}: expected 3 '|'-separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: unknown resource kind '{kind}'")]
    UnknownKind { line: usize, kind: String },

    #[error("line {line}: empty identifier for {kind}")]
    EmptyId { line: usize, kind: ResourceKind },

    #[error("duplicate {kind} '{id}' in {domain}, keeping the first")]
    Duplicate {
        domain: Domain,
        kind: ResourceKind,
        id: String,
    },
}

impl RecordError {
    /// Line number in the resource list file, if the record came from one
    pub fn line(&self) -> Option<usize> {
        match self {
            RecordError::FieldCount { line, .. }
            | RecordError::UnknownKind { line, .. }
            | RecordError::EmptyId { line, .. } => Some(*line),
            RecordError::Duplicate { .. } => None,
        }
    }
}

/// Failure to enumerate a whole domain
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("listing {domain} resources failed")]
    Listing {
        domain: Domain,
        #[source]
        source: CloudError,
    },

    #[error("cannot read resource list {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lazy, finite stream of descriptors for one domain
///
/// Unusable records surface as `Err` items so the caller decides whether
/// they are warnings or fatal. Consuming it does not re-query anything.
pub struct Inventory {
    domain: Domain,
    items: Box<dyn Iterator<Item = Result<ResourceDescriptor, RecordError>> + Send>,
}

impl Inventory {
    fn new<I>(domain: Domain, items: I) -> Self
    where
        I: Iterator<Item = Result<ResourceDescriptor, RecordError>> + Send + 'static,
    {
        let mut seen = HashSet::new();
        let items = items.map(move |item| -> Result<ResourceDescriptor, RecordError> {
            let descriptor = item?;
            if seen.insert(descriptor.id().to_string()) {
                Ok(descriptor)
            } else {
                Err(RecordError::Duplicate {
                    domain,
                    kind: descriptor.kind(),
                    id: descriptor.id().to_string(),
                })
            }
        });
        Self {
            domain,
            items: Box::new(items),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }
}

impl Iterator for Inventory {
    type Item = Result<ResourceDescriptor, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum Source {
    Live(Arc<dyn CloudClient>),
    File(PathBuf),
}

/// Enumerates resources per domain from the cloud or from a file
#[derive(Clone)]
pub struct Collector {
    source: Source,
}

impl Collector {
    /// Discover resources through the cloud client
    pub fn live(client: Arc<dyn CloudClient>) -> Self {
        Self {
            source: Source::Live(client),
        }
    }

    /// Read resources from a `kind|name|id` list file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live(_))
    }

    pub async fn collect(&self, domain: Domain) -> Result<Inventory, CollectError> {
        match &self.source {
            Source::Live(client) => collect_live(client.as_ref(), domain).await,
            Source::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|source| {
                    CollectError::Unreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok(Inventory::new(domain, file::parse_content(content, domain)))
            }
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Source::Live(_) => f.write_str("Collector(live)"),
            Source::File(path) => write!(f, "Collector({})", path.display()),
        }
    }
}

async fn collect_live(client: &dyn CloudClient, domain: Domain) -> Result<Inventory, CollectError> {
    let records = client
        .list(domain)
        .await
        .map_err(|source| CollectError::Listing { domain, source })?;
    info!(%domain, count = records.len(), "Discovered resources");

    // Instances reference their floating IPs by address only
    let floating_ids = if domain == Domain::Compute
        && records.iter().any(|r| !r.floating_addresses.is_empty())
    {
        match client.list(Domain::Network).await {
            Ok(network) => floating_ip_index(&network),
            Err(error) => {
                warn!(%error, "Cannot resolve instance floating IPs, continuing without them");
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    let snapshots = snapshot_index(&records);

    let descriptors: Vec<ResourceDescriptor> = records
        .into_iter()
        .filter(|record| !is_system_port(record))
        .map(|record| {
            let dependents = dependents_of(&record, &floating_ids, &snapshots);
            to_descriptor(record).with_dependents(dependents)
        })
        .collect();

    Ok(Inventory::new(domain, descriptors.into_iter().map(Ok)))
}

fn is_system_port(record: &RawRecord) -> bool {
    let system = record.kind == ResourceKind::Port
        && record
            .device_owner
            .as_deref()
            .is_some_and(|owner| SYSTEM_PORT_OWNERS.contains(&owner));
    if system {
        debug!(
            id = %record.id,
            owner = record.device_owner.as_deref().unwrap_or_default(),
            "Skipping system-owned port"
        );
    }
    system
}

/// Floating IP address -> floating IP id
fn floating_ip_index(records: &[RawRecord]) -> HashMap<String, String> {
    records
        .iter()
        .filter(|r| r.kind == ResourceKind::FloatingIp)
        .filter_map(|r| r.name.clone().map(|address| (address, r.id.clone())))
        .collect()
}

/// Volume id -> ids of its snapshots
fn snapshot_index(records: &[RawRecord]) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| r.kind == ResourceKind::VolumeSnapshot)
    {
        if let Some(volume_id) = &record.volume_id {
            index
                .entry(volume_id.clone())
                .or_default()
                .push(record.id.clone());
        }
    }
    index
}

fn dependents_of(
    record: &RawRecord,
    floating_ids: &HashMap<String, String>,
    snapshots: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    match record.kind {
        ResourceKind::Instance => record
            .floating_addresses
            .iter()
            .filter_map(|address| floating_ids.get(address).cloned())
            .collect(),
        ResourceKind::Volume => snapshots.get(&record.id).cloned().unwrap_or_default(),
        // A listener's default pool is already ordered by kind
        ResourceKind::LoadBalancer | ResourceKind::Pool => record.children.clone(),
        _ => Vec::new(),
    }
}

fn to_descriptor(record: RawRecord) -> ResourceDescriptor {
    let descriptor =
        ResourceDescriptor::new(record.kind, record.name.unwrap_or_default(), record.id);
    match record.description {
        Some(description) => descriptor.with_description(description),
        None => descriptor,
    }
}
