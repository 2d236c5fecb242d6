//! Shared OpenStack connection context
//!
//! Provides `OpenStackContext`: one HTTP client, one auth token and the
//! per-service endpoint catalog, shared by every request.

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use stack_sweep_common::{CloudError, ResourceKind};
use std::sync::Arc;
use std::time::Duration;

/// OpenStack service types that host cleanable resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Service {
    Compute,
    Volume,
    Image,
    Network,
    LoadBalancer,
    Orchestration,
    Dns,
}

impl Service {
    /// Service that hosts `kind`
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Instance | ResourceKind::Flavor | ResourceKind::Keypair => {
                Service::Compute
            }
            ResourceKind::Image => Service::Image,
            ResourceKind::VolumeSnapshot | ResourceKind::Volume => Service::Volume,
            ResourceKind::HealthMonitor
            | ResourceKind::Pool
            | ResourceKind::Listener
            | ResourceKind::LoadBalancer => Service::LoadBalancer,
            ResourceKind::FloatingIp
            | ResourceKind::Router
            | ResourceKind::Subnet
            | ResourceKind::Network
            | ResourceKind::SecurityGroup
            | ResourceKind::Port => Service::Network,
            ResourceKind::HeatStack => Service::Orchestration,
            ResourceKind::DnsZone => Service::Dns,
        }
    }

    /// Environment variable conventionally holding this service's endpoint
    pub fn env_var(self) -> &'static str {
        match self {
            Service::Compute => "OS_COMPUTE_URL",
            Service::Volume => "OS_VOLUME_URL",
            Service::Image => "OS_IMAGE_URL",
            Service::Network => "OS_NETWORK_URL",
            Service::LoadBalancer => "OS_LOADBALANCER_URL",
            Service::Orchestration => "OS_ORCHESTRATION_URL",
            Service::Dns => "OS_DNS_URL",
        }
    }
}

/// Per-service endpoint URLs, as found in the Keystone catalog
///
/// Compute, volume and orchestration URLs usually carry the project id
/// (`https://nova.example.com/v2.1/<project>`); network, image, load
/// balancer and DNS URLs are unversioned roots.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub compute: Option<String>,
    pub volume: Option<String>,
    pub image: Option<String>,
    pub network: Option<String>,
    pub load_balancer: Option<String>,
    pub orchestration: Option<String>,
    pub dns: Option<String>,
}

impl Endpoints {
    pub fn get(&self, service: Service) -> Option<&str> {
        let url = match service {
            Service::Compute => &self.compute,
            Service::Volume => &self.volume,
            Service::Image => &self.image,
            Service::Network => &self.network,
            Service::LoadBalancer => &self.load_balancer,
            Service::Orchestration => &self.orchestration,
            Service::Dns => &self.dns,
        };
        url.as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        use strum::IntoEnumIterator;
        Service::iter().all(|service| self.get(service).is_none())
    }
}

/// Shared OpenStack context for issuing authenticated requests.
///
/// Cloning is cheap; clones share the same connection pool.
///
/// # Example
/// ```ignore
/// let ctx = OpenStackContext::new(token, endpoints, Duration::from_secs(30))?;
/// let client = OpenStackClient::from_context(&ctx);
/// ```
#[derive(Clone)]
pub struct OpenStackContext {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl OpenStackContext {
    /// Build a context around a pre-issued Keystone token
    pub fn new(token: &str, endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let mut token = HeaderValue::from_str(token).context("Auth token is not a valid header value")?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("X-Auth-Token", token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("stack-sweep/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Full URL for `path` on `service`
    pub fn url(&self, service: Service, path: &str) -> Result<String, CloudError> {
        let base = self.endpoints.get(service).ok_or_else(|| {
            CloudError::Unavailable(format!(
                "no {service} endpoint configured (set {})",
                service.env_var()
            ))
        })?;
        // Pagination links may already be absolute
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(format!("{base}{path}"))
    }
}

impl std::fmt::Debug for OpenStackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackContext")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}
