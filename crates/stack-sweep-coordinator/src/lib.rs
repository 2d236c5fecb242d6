//! stack-sweep-coordinator - dependency-ordered OpenStack cleanup
//!
//! This crate provides the `stack-sweep` binary and the engine behind it:
//! discovery, filtering, staged deletion and verification of cloud resources.

pub mod config;
pub mod filter;
pub mod inventory;
pub mod openstack;
pub mod orchestrator;
pub mod wait;
