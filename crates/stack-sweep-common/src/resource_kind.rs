//! OpenStack resource kinds, their service domains and cleanup ordering
//!
//! Provides consistent cleanup stages across collection, planning and
//! reporting. Resources must be cleaned in dependency order to avoid
//! "in use" conflicts from the APIs.

use serde::{Deserialize, Serialize};

/// Service domain owning a resource kind
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Domain {
    /// Heat stacks
    Orchestration,
    /// Designate zones
    Dns,
    /// Nova servers, flavors, keypairs and Glance images
    Compute,
    /// Cinder volumes and snapshots
    Storage,
    /// Octavia load balancers and their children
    #[strum(to_string = "loadbalancer", serialize = "load-balancer")]
    LoadBalancer,
    /// Neutron resources
    Network,
}

impl Domain {
    /// Domains in the order they are torn down
    pub const ALL: [Domain; 6] = [
        Domain::Orchestration,
        Domain::Dns,
        Domain::Compute,
        Domain::Storage,
        Domain::LoadBalancer,
        Domain::Network,
    ];

    /// Resource kinds hosted by this domain, in cleanup order
    pub fn kinds(self) -> impl Iterator<Item = ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(move |kind| kind.domain() == self)
    }
}

/// Types of OpenStack resources stack-sweep knows how to delete
///
/// Parses from the canonical kebab-case name, the singular snake-case
/// name, and the plural names used in cleanup log files
/// (`instances`, `sec_groups`, `loadbalancers`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum ResourceKind {
    #[strum(
        to_string = "heat-stack",
        serialize = "heat_stack",
        serialize = "heat_stacks",
        serialize = "stack",
        serialize = "stacks"
    )]
    HeatStack,
    #[strum(
        to_string = "dns-zone",
        serialize = "dns_zone",
        serialize = "dns_zones",
        serialize = "zone",
        serialize = "zones"
    )]
    DnsZone,
    #[strum(
        to_string = "instance",
        serialize = "instances",
        serialize = "server",
        serialize = "servers"
    )]
    Instance,
    #[strum(to_string = "flavor", serialize = "flavors")]
    Flavor,
    #[strum(to_string = "keypair", serialize = "keypairs")]
    Keypair,
    #[strum(to_string = "image", serialize = "images")]
    Image,
    #[strum(
        to_string = "volume-snapshot",
        serialize = "volume_snapshot",
        serialize = "volume_snapshots",
        serialize = "snapshot",
        serialize = "snapshots"
    )]
    VolumeSnapshot,
    #[strum(to_string = "volume", serialize = "volumes")]
    Volume,
    #[strum(
        to_string = "health-monitor",
        serialize = "health_monitor",
        serialize = "health_monitors",
        serialize = "healthmonitors"
    )]
    HealthMonitor,
    #[strum(to_string = "pool", serialize = "pools")]
    Pool,
    #[strum(to_string = "listener", serialize = "listeners")]
    Listener,
    #[strum(
        to_string = "load-balancer",
        serialize = "load_balancer",
        serialize = "load_balancers",
        serialize = "loadbalancer",
        serialize = "loadbalancers"
    )]
    LoadBalancer,
    #[strum(
        to_string = "floating-ip",
        serialize = "floating_ip",
        serialize = "floating_ips",
        serialize = "floatingips"
    )]
    FloatingIp,
    #[strum(to_string = "router", serialize = "routers")]
    Router,
    #[strum(to_string = "subnet", serialize = "subnets")]
    Subnet,
    #[strum(to_string = "network", serialize = "networks")]
    Network,
    #[strum(
        to_string = "security-group",
        serialize = "security_group",
        serialize = "security_groups",
        serialize = "sec_group",
        serialize = "sec_groups"
    )]
    SecurityGroup,
    #[strum(to_string = "port", serialize = "ports")]
    Port,
}

impl ResourceKind {
    /// Every kind, in cleanup order
    pub const ALL: [ResourceKind; 18] = [
        ResourceKind::HeatStack,
        ResourceKind::DnsZone,
        ResourceKind::Instance,
        ResourceKind::Flavor,
        ResourceKind::Keypair,
        ResourceKind::Image,
        ResourceKind::VolumeSnapshot,
        ResourceKind::Volume,
        ResourceKind::HealthMonitor,
        ResourceKind::Pool,
        ResourceKind::Listener,
        ResourceKind::LoadBalancer,
        ResourceKind::FloatingIp,
        ResourceKind::Router,
        ResourceKind::Subnet,
        ResourceKind::Network,
        ResourceKind::SecurityGroup,
        ResourceKind::Port,
    ];

    /// Number of distinct cleanup stages
    pub const STAGE_COUNT: u8 = 15;

    /// Service domain that owns this kind
    pub fn domain(self) -> Domain {
        match self {
            ResourceKind::HeatStack => Domain::Orchestration,
            ResourceKind::DnsZone => Domain::Dns,
            ResourceKind::Instance
            | ResourceKind::Flavor
            | ResourceKind::Keypair
            | ResourceKind::Image => Domain::Compute,
            ResourceKind::VolumeSnapshot | ResourceKind::Volume => Domain::Storage,
            ResourceKind::HealthMonitor
            | ResourceKind::Pool
            | ResourceKind::Listener
            | ResourceKind::LoadBalancer => Domain::LoadBalancer,
            ResourceKind::FloatingIp
            | ResourceKind::Router
            | ResourceKind::Subnet
            | ResourceKind::Network
            | ResourceKind::SecurityGroup
            | ResourceKind::Port => Domain::Network,
        }
    }

    /// Get cleanup stage (lower number = cleanup first)
    ///
    /// Kinds sharing a stage are mutually independent:
    /// - 0-1: Heat stacks, then DNS zones (stacks may own zones)
    /// - 2: Instances
    /// - 3: Flavors, keypairs and images
    /// - 4-5: Volume snapshots, then volumes
    /// - 6-9: Health monitors, pools, listeners, then load balancers
    /// - 10-14: Floating IPs, routers, networks/subnets, security groups, ports
    ///
    /// # Correct Order Rationale
    ///
    /// Parent deletes are rejected while children exist (a network with
    /// active ports, a volume with snapshots, a load balancer with listeners),
    /// and provider-side cascade is inconsistent across kinds.
    pub fn cleanup_stage(self) -> u8 {
        match self {
            ResourceKind::HeatStack => 0,
            ResourceKind::DnsZone => 1,
            ResourceKind::Instance => 2,
            ResourceKind::Flavor | ResourceKind::Keypair | ResourceKind::Image => 3,
            ResourceKind::VolumeSnapshot => 4,
            ResourceKind::Volume => 5,
            ResourceKind::HealthMonitor => 6,
            ResourceKind::Pool => 7,
            ResourceKind::Listener => 8,
            ResourceKind::LoadBalancer => 9,
            ResourceKind::FloatingIp => 10,
            ResourceKind::Router => 11,
            ResourceKind::Subnet | ResourceKind::Network => 12,
            ResourceKind::SecurityGroup => 13,
            ResourceKind::Port => 14,
        }
    }

    /// Position in [`ResourceKind::ALL`], used to order kinds inside a shared stage
    pub fn rank(self) -> usize {
        ResourceKind::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(ResourceKind::ALL.len())
    }

    /// Human-readable label used in tables
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::HeatStack => "HEAT STACK",
            ResourceKind::DnsZone => "DNS ZONE",
            ResourceKind::Instance => "INSTANCE",
            ResourceKind::Flavor => "FLAVOR",
            ResourceKind::Keypair => "KEYPAIR",
            ResourceKind::Image => "IMAGE",
            ResourceKind::VolumeSnapshot => "VOLUME SNAPSHOT",
            ResourceKind::Volume => "VOLUME",
            ResourceKind::HealthMonitor => "HEALTH MONITOR",
            ResourceKind::Pool => "POOL",
            ResourceKind::Listener => "LISTENER",
            ResourceKind::LoadBalancer => "LOAD BALANCER",
            ResourceKind::FloatingIp => "FLOATING IP",
            ResourceKind::Router => "ROUTER",
            ResourceKind::Subnet => "SUBNET",
            ResourceKind::Network => "NETWORK",
            ResourceKind::SecurityGroup => "SECURITY GROUP",
            ResourceKind::Port => "PORT",
        }
    }
}
