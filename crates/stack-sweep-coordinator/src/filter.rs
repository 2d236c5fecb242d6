//! Name/description pattern matching

use crate::config::ConfigError;
use regex::Regex;
use stack_sweep_common::ResourceDescriptor;

/// Compiled resource filter
///
/// The pattern is searched (not anchored) in the resource name first, then
/// in its description. A missing or empty description never matches.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    regex: Regex,
}

impl ResourceFilter {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, descriptor: &ResourceDescriptor) -> bool {
        if self.regex.is_match(descriptor.name()) {
            return true;
        }
        descriptor
            .description()
            .is_some_and(|description| !description.is_empty() && self.regex.is_match(description))
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}
