//! Listing responses to raw records
//!
//! Each service returns its own JSON envelope; these types pick out the
//! identity fields plus the relationship hints the collector needs.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use stack_sweep_common::{CloudError, RawRecord, ResourceKind};
use std::collections::HashMap;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Link to the next page: a path relative to the endpoint (Glance) or
    /// an absolute URL (`*_links` and Designate `links`)
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    #[serde(default)]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Named {
    fn into_record(self, kind: ResourceKind) -> RawRecord {
        RawRecord {
            name: self.name,
            description: self.description,
            ..RawRecord::new(kind, self.id)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Server {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    addresses: HashMap<String, Vec<ServerAddress>>,
}

#[derive(Debug, Deserialize)]
struct ServerAddress {
    addr: String,
    #[serde(rename = "OS-EXT-IPS:type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeypairEntry {
    keypair: Keypair,
}

#[derive(Debug, Deserialize)]
struct Keypair {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    volume_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LoadBalancer {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    listeners: Vec<IdRef>,
    #[serde(default)]
    pools: Vec<IdRef>,
}

#[derive(Debug, Deserialize)]
struct Listener {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    default_pool_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pool {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    healthmonitor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FloatingIp {
    id: String,
    #[serde(default)]
    floating_ip_address: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Port {
    #[serde(flatten)]
    named: Named,
    #[serde(default)]
    device_owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Stack {
    id: String,
    stack_name: String,
    #[serde(default)]
    description: Option<String>,
}

/// JSON key wrapping the listing of `kind`
pub fn collection_key(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::HeatStack => "stacks",
        ResourceKind::DnsZone => "zones",
        ResourceKind::Instance => "servers",
        ResourceKind::Flavor => "flavors",
        ResourceKind::Keypair => "keypairs",
        ResourceKind::Image => "images",
        ResourceKind::VolumeSnapshot => "snapshots",
        ResourceKind::Volume => "volumes",
        ResourceKind::HealthMonitor => "healthmonitors",
        ResourceKind::Pool => "pools",
        ResourceKind::Listener => "listeners",
        ResourceKind::LoadBalancer => "loadbalancers",
        ResourceKind::FloatingIp => "floatingips",
        ResourceKind::Router => "routers",
        ResourceKind::Subnet => "subnets",
        ResourceKind::Network => "networks",
        ResourceKind::SecurityGroup => "security_groups",
        ResourceKind::Port => "ports",
    }
}

fn items<T: DeserializeOwned>(
    body: &mut serde_json::Map<String, serde_json::Value>,
    kind: ResourceKind,
) -> Result<Vec<T>, CloudError> {
    let key = collection_key(kind);
    let value = body
        .remove(key)
        .ok_or_else(|| CloudError::Decode(format!("{kind} listing has no '{key}' field")))?;
    serde_json::from_value(value)
        .map_err(|e| CloudError::Decode(format!("{kind} listing: {e}")))
}

/// Next-page link of a listing body, in whichever form the service uses
fn next_link(
    body: &serde_json::Map<String, serde_json::Value>,
    kind: ResourceKind,
) -> Option<String> {
    // Glance
    if let Some(next) = body.get("next").and_then(|v| v.as_str()) {
        return Some(next.to_string());
    }
    // Designate
    if let Some(next) = body
        .get("links")
        .and_then(|links| links.get("next"))
        .and_then(|v| v.as_str())
    {
        return Some(next.to_string());
    }
    // Nova, Cinder, Neutron, Octavia
    let links = body.get(&format!("{}_links", collection_key(kind)))?;
    let links: Vec<Link> = serde_json::from_value(links.clone()).ok()?;
    links
        .into_iter()
        .find(|link| link.rel.as_deref() == Some("next"))
        .map(|link| link.href)
}

/// Parse one listing response body for `kind`
pub fn parse_page(kind: ResourceKind, body: &[u8]) -> Result<Page, CloudError> {
    let mut body: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| CloudError::Decode(format!("{kind} listing: {e}")))?;

    let next = next_link(&body, kind);

    let records = match kind {
        ResourceKind::Instance => items::<Server>(&mut body, kind)?
            .into_iter()
            .map(|server| {
                let floating_addresses = server
                    .addresses
                    .values()
                    .flatten()
                    .filter(|a| a.kind.as_deref() == Some("floating"))
                    .map(|a| a.addr.clone())
                    .collect();
                RawRecord {
                    floating_addresses,
                    ..server.named.into_record(kind)
                }
            })
            .collect(),
        // Keypairs are addressed by name
        ResourceKind::Keypair => items::<KeypairEntry>(&mut body, kind)?
            .into_iter()
            .map(|entry| RawRecord::new(kind, entry.keypair.name.clone()).named(entry.keypair.name))
            .collect(),
        ResourceKind::VolumeSnapshot => items::<Snapshot>(&mut body, kind)?
            .into_iter()
            .map(|snapshot| RawRecord {
                volume_id: snapshot.volume_id,
                ..snapshot.named.into_record(kind)
            })
            .collect(),
        ResourceKind::LoadBalancer => items::<LoadBalancer>(&mut body, kind)?
            .into_iter()
            .map(|lb| RawRecord {
                children: lb
                    .listeners
                    .into_iter()
                    .chain(lb.pools)
                    .map(|child| child.id)
                    .collect(),
                ..lb.named.into_record(kind)
            })
            .collect(),
        ResourceKind::Listener => items::<Listener>(&mut body, kind)?
            .into_iter()
            .map(|listener| RawRecord {
                children: listener.default_pool_id.into_iter().collect(),
                ..listener.named.into_record(kind)
            })
            .collect(),
        ResourceKind::Pool => items::<Pool>(&mut body, kind)?
            .into_iter()
            .map(|pool| RawRecord {
                children: pool.healthmonitor_id.into_iter().collect(),
                ..pool.named.into_record(kind)
            })
            .collect(),
        // Floating IPs are named by address
        ResourceKind::FloatingIp => items::<FloatingIp>(&mut body, kind)?
            .into_iter()
            .map(|fip| RawRecord {
                name: fip.floating_ip_address,
                description: fip.description,
                ..RawRecord::new(kind, fip.id)
            })
            .collect(),
        ResourceKind::Port => items::<Port>(&mut body, kind)?
            .into_iter()
            .map(|port| RawRecord {
                device_owner: port.device_owner,
                ..port.named.into_record(kind)
            })
            .collect(),
        ResourceKind::HeatStack => items::<Stack>(&mut body, kind)?
            .into_iter()
            .map(|stack| RawRecord {
                name: Some(stack.stack_name),
                description: stack.description,
                ..RawRecord::new(kind, stack.id)
            })
            .collect(),
        _ => items::<Named>(&mut body, kind)?
            .into_iter()
            .map(|named| named.into_record(kind))
            .collect(),
    };

    Ok(Page { records, next })
}
