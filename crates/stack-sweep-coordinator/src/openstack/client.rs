//! REST implementation of [`CloudClient`]
//!
//! Talks to Nova, Cinder, Glance, Neutron, Octavia, Heat and Designate over
//! their public APIs using a pre-issued token. Most deletes are a single
//! `DELETE`; a few kinds need preparation first:
//!
//! - routers: clear the external gateway and detach interfaces
//! - networks: remove leftover non-system ports
//! - load balancers: cascade delete
//! - heat stacks: resolve the stack name, which the delete URL requires

use super::context::{OpenStackContext, Service};
use super::error::{classify_status, classify_transport};
use super::records::{Page, parse_page};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use stack_sweep_common::defaults::SYSTEM_PORT_OWNERS;
use stack_sweep_common::{CloudClient, CloudError, Domain, RawRecord, ResourceKind};
use tracing::{debug, warn};

/// Listing pages beyond this many are not followed
const MAX_PAGES: usize = 100;

/// Collection path of `kind`, relative to its service endpoint
pub fn collection_path(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::HeatStack => "/stacks",
        ResourceKind::DnsZone => "/v2/zones",
        ResourceKind::Instance => "/servers",
        ResourceKind::Flavor => "/flavors",
        ResourceKind::Keypair => "/os-keypairs",
        ResourceKind::Image => "/v2/images",
        ResourceKind::VolumeSnapshot => "/snapshots",
        ResourceKind::Volume => "/volumes",
        ResourceKind::HealthMonitor => "/v2/lbaas/healthmonitors",
        ResourceKind::Pool => "/v2/lbaas/pools",
        ResourceKind::Listener => "/v2/lbaas/listeners",
        ResourceKind::LoadBalancer => "/v2/lbaas/loadbalancers",
        ResourceKind::FloatingIp => "/v2.0/floatingips",
        ResourceKind::Router => "/v2.0/routers",
        ResourceKind::Subnet => "/v2.0/subnets",
        ResourceKind::Network => "/v2.0/networks",
        ResourceKind::SecurityGroup => "/v2.0/security-groups",
        ResourceKind::Port => "/v2.0/ports",
    }
}

/// Listing path of `kind`; detail views where the plain view omits fields
pub fn list_path(kind: ResourceKind) -> String {
    match kind {
        ResourceKind::Instance
        | ResourceKind::Flavor
        | ResourceKind::Volume
        | ResourceKind::VolumeSnapshot => format!("{}/detail", collection_path(kind)),
        _ => collection_path(kind).to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RouterEnvelope {
    router: Router,
}

#[derive(Debug, Deserialize)]
struct Router {
    #[serde(default)]
    external_gateway_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PortsEnvelope {
    ports: Vec<PortDetail>,
}

#[derive(Debug, Deserialize)]
struct PortDetail {
    id: String,
    #[serde(default)]
    device_owner: Option<String>,
    #[serde(default)]
    fixed_ips: Vec<FixedIp>,
}

#[derive(Debug, Deserialize)]
struct FixedIp {
    subnet_id: String,
}

#[derive(Debug, Deserialize)]
struct StackEnvelope {
    stack: StackDetail,
}

#[derive(Debug, Deserialize)]
struct StackDetail {
    id: String,
    stack_name: String,
    #[serde(default)]
    stack_status: Option<String>,
}

/// OpenStack REST client
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    ctx: OpenStackContext,
}

impl OpenStackClient {
    pub fn from_context(ctx: &OpenStackContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    fn request(
        &self,
        method: Method,
        service: Service,
        path: &str,
    ) -> Result<RequestBuilder, CloudError> {
        let url = self.ctx.url(service, path)?;
        Ok(self.ctx.http().request(method, url))
    }

    /// Send a request, turning non-success statuses into errors
    async fn send(&self, request: RequestBuilder) -> Result<Response, CloudError> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
    ) -> Result<T, CloudError> {
        let response = self.send(self.request(Method::GET, service, path)?).await?;
        response.json().await.map_err(|e| classify_transport(&e))
    }

    async fn list_kind(&self, kind: ResourceKind) -> Result<Vec<RawRecord>, CloudError> {
        let service = Service::for_kind(kind);
        let mut path = list_path(kind);
        let mut records = Vec::new();

        for _ in 0..MAX_PAGES {
            let response = self.send(self.request(Method::GET, service, &path)?).await?;
            let body = response.bytes().await.map_err(|e| classify_transport(&e))?;
            let Page {
                records: page,
                next,
            } = parse_page(kind, &body)?;
            records.extend(page);

            match next {
                Some(next) => path = next,
                None => return Ok(records),
            }
        }

        warn!(%kind, pages = MAX_PAGES, "Listing truncated");
        Ok(records)
    }

    fn item_path(kind: ResourceKind, id: &str) -> String {
        format!("{}/{id}", collection_path(kind))
    }

    async fn delete_path(&self, service: Service, path: &str) -> Result<(), CloudError> {
        self.send(self.request(Method::DELETE, service, path)?)
            .await
            .map(|_| ())
    }

    /// Clear the gateway and detach every interface so the router can go
    async fn detach_router(&self, id: &str) -> Result<(), CloudError> {
        let path = Self::item_path(ResourceKind::Router, id);
        let envelope: RouterEnvelope = self.get_json(Service::Network, &path).await?;

        if envelope
            .router
            .external_gateway_info
            .is_some_and(|info| !info.is_null())
        {
            let body = json!({ "router": { "external_gateway_info": null } });
            match self
                .send(self.request(Method::PUT, Service::Network, &path)?.json(&body))
                .await
            {
                Ok(_) => debug!(router = %id, "Removed router gateway"),
                Err(e) => warn!(router = %id, error = %e, "Could not remove router gateway"),
            }
        }

        let ports: PortsEnvelope = self
            .get_json(Service::Network, &format!("/v2.0/ports?device_id={id}"))
            .await?;
        let interfaces = ports.ports.iter().filter(|p| {
            p.device_owner
                .as_deref()
                .is_some_and(|owner| owner.starts_with("network:router_interface"))
        });
        for port in interfaces {
            let Some(fixed_ip) = port.fixed_ips.first() else {
                continue;
            };
            let body = json!({ "subnet_id": fixed_ip.subnet_id });
            let request = self
                .request(
                    Method::PUT,
                    Service::Network,
                    &format!("{path}/remove_router_interface"),
                )?
                .json(&body);
            // The interface may already be gone
            if let Err(e) = self.send(request).await {
                debug!(router = %id, port = %port.id, error = %e, "Could not detach interface");
            }
        }

        Ok(())
    }

    /// Delete ports still bound to a network, except system-owned ones
    async fn clear_network_ports(&self, id: &str) -> Result<(), CloudError> {
        let ports: PortsEnvelope = self
            .get_json(Service::Network, &format!("/v2.0/ports?network_id={id}"))
            .await?;
        for port in ports.ports {
            let owner = port.device_owner.as_deref().unwrap_or_default();
            if SYSTEM_PORT_OWNERS.contains(&owner) {
                continue;
            }
            let path = Self::item_path(ResourceKind::Port, &port.id);
            match self.delete_path(Service::Network, &path).await {
                Ok(()) => debug!(network = %id, port = %port.id, "Deleted leftover port"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(network = %id, port = %port.id, error = %e, "Could not delete port"),
            }
        }
        Ok(())
    }

    async fn stack(&self, id: &str) -> Result<StackDetail, CloudError> {
        let path = Self::item_path(ResourceKind::HeatStack, id);
        let envelope: StackEnvelope = self.get_json(Service::Orchestration, &path).await?;
        Ok(envelope.stack)
    }
}

#[async_trait]
impl CloudClient for OpenStackClient {
    async fn list(&self, domain: Domain) -> Result<Vec<RawRecord>, CloudError> {
        let mut records = Vec::new();
        let mut unavailable = Vec::new();
        let mut listed_any = false;

        for kind in domain.kinds() {
            match self.list_kind(kind).await {
                Ok(found) => {
                    debug!(%kind, count = found.len(), "Listed resources");
                    records.extend(found);
                    listed_any = true;
                }
                // Missing endpoint: skip the kind, keep the rest of the domain
                Err(CloudError::Unavailable(reason))
                    if self.ctx.endpoints().get(Service::for_kind(kind)).is_none() =>
                {
                    warn!(%kind, %reason, "Skipping resource kind");
                    unavailable.push(reason);
                }
                Err(e) => return Err(e),
            }
        }

        if !listed_any {
            return Err(CloudError::Unavailable(unavailable.join("; ")));
        }
        Ok(records)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CloudError> {
        let service = Service::for_kind(kind);
        match kind {
            ResourceKind::Router => {
                self.detach_router(id).await?;
                self.delete_path(service, &Self::item_path(kind, id)).await
            }
            ResourceKind::Network => {
                if let Err(e) = self.clear_network_ports(id).await {
                    if e.is_not_found() {
                        return Err(e);
                    }
                    debug!(network = %id, error = %e, "Could not inspect network ports");
                }
                self.delete_path(service, &Self::item_path(kind, id)).await
            }
            ResourceKind::LoadBalancer => {
                let path = format!("{}?cascade=true", Self::item_path(kind, id));
                self.delete_path(service, &path).await
            }
            ResourceKind::HeatStack => {
                let stack = self.stack(id).await?;
                let path = format!("/stacks/{}/{}", stack.stack_name, stack.id);
                self.delete_path(service, &path).await
            }
            _ => self.delete_path(service, &Self::item_path(kind, id)).await,
        }
    }

    async fn exists(&self, kind: ResourceKind, id: &str) -> Result<bool, CloudError> {
        // Heat keeps deleted stacks visible by id
        if kind == ResourceKind::HeatStack {
            return match self.stack(id).await {
                Ok(stack) => Ok(stack.stack_status.as_deref() != Some("DELETE_COMPLETE")),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            };
        }

        let request = self.request(Method::GET, Service::for_kind(kind), &Self::item_path(kind, id))?;
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
