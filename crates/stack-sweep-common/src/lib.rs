//! stack-sweep-common - Shared types for stack-sweep
//!
//! This crate provides the resource model and the cloud capability
//! interface, without any HTTP dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`cloud`]: `CloudClient` capability trait and `CloudError`
//! - [`defaults`]: Default configuration values
//! - [`descriptor`]: `ResourceDescriptor` and raw listing records
//! - [`outcome`]: Per-resource run outcomes
//! - [`resource_kind`]: Resource kinds, domains and cleanup stages

pub mod cloud;
pub mod defaults;
pub mod descriptor;
pub mod outcome;
pub mod resource_kind;

// Re-export commonly used types
pub use cloud::{CloudClient, CloudError};
pub use descriptor::{RawRecord, ResourceDescriptor};
pub use outcome::{Deletion, OutcomeKind, RunOutcome};
pub use resource_kind::{Domain, ResourceKind};
