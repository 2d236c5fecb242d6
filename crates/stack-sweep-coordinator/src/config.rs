//! Configuration types for the coordinator

use stack_sweep_common::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_FILTER, default_poll_interval, default_verify_timeout,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid run configuration, detected before any listing or deletion
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("cannot read resource list {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which resources a run considers
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Regular expression searched in names, then descriptions
    pub pattern: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Where descriptors come from
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Resource list file (`kind|name|id` lines); live discovery when unset
    pub file: Option<PathBuf>,
    /// Treat malformed resource list lines as fatal
    pub strict: bool,
}

/// How deletions are carried out
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Report what would be deleted without calling the cloud
    pub dry_run: bool,
    /// Poll for absence after each accepted delete
    pub verify: bool,
    /// Upper bound on verification for one resource
    pub verify_timeout: Duration,
    /// Delay between existence polls
    pub poll_interval: Duration,
    /// Delete/verify pairs allowed in flight within one stage
    pub concurrency: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify: true,
            verify_timeout: default_verify_timeout(),
            poll_interval: default_poll_interval(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Configuration for a sweep run
///
/// Composed of focused sub-configs, each owned by the component that reads it.
#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    pub filter: FilterConfig,
    pub source: SourceConfig,
    pub execution: ExecutionConfig,
}

impl SweepConfig {
    /// Reject settings that would make the run meaningless
    ///
    /// Pattern compilation is checked separately by
    /// [`ResourceFilter::new`](crate::filter::ResourceFilter::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.execution.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    pub fn pattern(&self) -> &str {
        &self.filter.pattern
    }

    pub fn dry_run(&self) -> bool {
        self.execution.dry_run
    }

    pub fn is_file_mode(&self) -> bool {
        self.source.file.is_some()
    }
}
