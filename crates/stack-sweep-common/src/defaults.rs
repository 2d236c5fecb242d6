//! Default configuration values shared between the coordinator and tests
//!
//! These constants keep CLI defaults and library defaults in sync.

use std::time::Duration;

/// Default resource name filter
pub const DEFAULT_FILTER: &str = ".*test-cluster.*";

/// Default time to wait for a deleted resource to disappear, in seconds
pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 60;

/// Default delay between existence polls, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default number of in-flight delete/verify pairs within a stage
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default per-request HTTP timeout, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Comment marker for resource list files
pub const COMMENT_MARKER: char = '#';

/// Port owners managed by their parent resources; never deleted directly
pub const SYSTEM_PORT_OWNERS: &[&str] = &[
    "network:router_interface",
    "network:router_gateway",
    "network:dhcp",
    "network:floatingip",
];

/// Returns the default verification timeout
pub fn default_verify_timeout() -> Duration {
    Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS)
}

/// Returns the default poll interval
pub fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
}
