//! Shared test utilities for stack-sweep
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`cloud`]: Scripted in-memory `CloudClient`
//! - [`files`]: Temporary resource list files

pub mod cloud;
pub mod files;

// Re-export commonly used items
pub use cloud::FakeCloud;
pub use files::resource_list;
