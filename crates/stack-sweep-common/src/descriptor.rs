//! Uniform resource records shared by every cleanup stage

use crate::resource_kind::{Domain, ResourceKind};
use serde::Serialize;

/// One resource instance as seen by the cleanup pipeline
///
/// Built once by the inventory collector and never mutated afterwards;
/// outcomes are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    kind: ResourceKind,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependents: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            id: id.into(),
            dependents: Vec::new(),
        }
    }

    /// Attach a description; empty strings are treated as absent
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    /// Identifiers of resources that must be deleted before this one
    pub fn with_dependents<I, S>(mut self, dependents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependents = dependents.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn domain(&self) -> Domain {
        self.kind.domain()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    /// Name for log lines, falling back to the id for unnamed resources
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A listing result as returned by a [`CloudClient`](crate::CloudClient)
///
/// Service responses are normalized into this shape at the client boundary.
/// Besides identity it carries the relationship hints the collector turns
/// into descriptor dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: ResourceKind,
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Floating addresses attached to an instance
    pub floating_addresses: Vec<String>,
    /// Parent volume of a snapshot
    pub volume_id: Option<String>,
    /// Child resources (listeners and pools of a load balancer, the monitor of a pool)
    pub children: Vec<String>,
    /// Owner of a port (`network:dhcp`, `compute:nova`, ...)
    pub device_owner: Option<String>,
}

impl RawRecord {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: None,
            description: None,
            floating_addresses: Vec::new(),
            volume_id: None,
            children: Vec::new(),
            device_owner: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
