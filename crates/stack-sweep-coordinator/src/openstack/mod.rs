//! OpenStack REST client for the coordinator
//!
//! Implements [`CloudClient`](stack_sweep_common::CloudClient) over a
//! pre-issued token and per-service endpoint URLs:
//! - context: shared HTTP client and endpoint catalog
//! - records: listing responses to raw records
//! - error: status and fault body classification
//! - client: list, delete and existence checks per resource kind

pub mod client;
pub mod context;
pub mod error;
pub mod records;

pub use client::OpenStackClient;
pub use context::{Endpoints, OpenStackContext, Service};
pub use error::{classify_status, classify_transport};
