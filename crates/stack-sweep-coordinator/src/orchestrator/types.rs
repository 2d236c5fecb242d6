//! Core types for the sweep engine
//!
//! Contains the cancellation signals, the fatal error type and the preview
//! returned before any deletion happens.

use super::plan::{Plan, PlanError};
use super::report::RunSummary;
use crate::config::ConfigError;
use crate::inventory::RecordError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Operator interrupts for a running sweep
///
/// `stop` prevents new deletes; in-flight verifications still finish.
/// `abort` additionally ends verification waits. Aborting implies stopping.
#[derive(Debug, Clone, Default)]
pub struct RunSignals {
    pub stop: CancellationToken,
    pub abort: CancellationToken,
}

impl RunSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn abort(&self) {
        self.stop.cancel();
        self.abort.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Errors that end a run before any deletion
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("malformed resource record: {0}")]
    Record(#[from] RecordError),
}

/// What a run would do, computed without deleting anything
#[derive(Debug, Clone)]
pub struct Preview {
    /// Matching resources in deletion order
    pub plan: Plan,
    /// Non-matching resources, skipped domains and collection warnings
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_implies_stop() {
        let signals = RunSignals::new();
        assert!(!signals.is_stopped());

        signals.abort();
        assert!(signals.is_stopped());
        assert!(signals.abort.is_cancelled());
    }

    #[test]
    fn test_stop_leaves_abort_untouched() {
        let signals = RunSignals::new();
        signals.stop();
        assert!(signals.is_stopped());
        assert!(!signals.abort.is_cancelled());
    }

    #[test]
    fn test_cycle_error_message_is_preserved() {
        let err = SweepError::from(PlanError::DependencyCycle {
            ids: vec!["a".into(), "b".into()],
        });
        assert_eq!(err.to_string(), "ERROR: dependency cycle detected: a, b");
    }
}
