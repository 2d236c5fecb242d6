//! Capability interface to an authenticated cloud client
//!
//! The cleanup core never talks to a service directly; it goes through
//! [`CloudClient`], which hides authentication and transport.

use crate::descriptor::RawRecord;
use crate::resource_kind::{Domain, ResourceKind};
use async_trait::async_trait;
use thiserror::Error;

/// Cloud API error categories for cleanup and verification logic
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// Resource was not found (deleting it is a no-op)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource is in use or in a state that forbids the operation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Token rejected or missing permissions
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Service endpoint missing or temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Any other API error response
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl CloudError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// Check if this error is transient
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CloudError::Throttled | CloudError::Unavailable(_) | CloudError::Transport(_)
        )
    }
}

/// The three primitives the cleanup core needs from a cloud
///
/// `delete` answers `Err(CloudError::NotFound)` for resources that do not
/// exist; callers treat that as success.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// List every resource of every kind hosted by `domain`
    async fn list(&self, domain: Domain) -> Result<Vec<RawRecord>, CloudError>;

    /// Issue one delete request
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CloudError>;

    /// Check whether the resource still exists
    async fn exists(&self, kind: ResourceKind, id: &str) -> Result<bool, CloudError>;
}
