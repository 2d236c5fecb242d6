//! Per-resource cleanup outcomes
//!
//! Every descriptor seen by a run ends with exactly one [`RunOutcome`].
//! [`OutcomeKind`] is its field-less tag, used as a summary key.

use serde::Serialize;
use std::fmt;

/// How a resource came to be counted as deleted
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Deletion {
    /// Delete accepted and absence observed by the verifier
    Verified,
    /// Delete answered "not found"
    AlreadyGone,
    /// Dry run: nothing was sent
    Simulated,
    /// Delete accepted, verification disabled
    Unverified,
}

/// Final state of one resource after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Deleted(Deletion),
    SkippedNoMatch,
    /// Operator interrupt arrived before the delete was issued
    SkippedCancelled,
    DeleteFailed(String),
    VerifyTimeout,
    VerifyError(String),
}

/// Field-less tag of a [`RunOutcome`]
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
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Deleted,
    SkippedNoMatch,
    SkippedCancelled,
    DeleteFailed,
    VerifyTimeout,
    VerifyError,
}

impl OutcomeKind {
    /// Outcomes that indicate something went wrong
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            OutcomeKind::DeleteFailed | OutcomeKind::VerifyTimeout | OutcomeKind::VerifyError
        )
    }
}

impl RunOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RunOutcome::Deleted(_) => OutcomeKind::Deleted,
            RunOutcome::SkippedNoMatch => OutcomeKind::SkippedNoMatch,
            RunOutcome::SkippedCancelled => OutcomeKind::SkippedCancelled,
            RunOutcome::DeleteFailed(_) => OutcomeKind::DeleteFailed,
            RunOutcome::VerifyTimeout => OutcomeKind::VerifyTimeout,
            RunOutcome::VerifyError(_) => OutcomeKind::VerifyError,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, RunOutcome::Deleted(_))
    }

    pub fn is_failure(&self) -> bool {
        self.kind().is_failure()
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, RunOutcome::Deleted(Deletion::Simulated))
    }

    /// Failure reason, if the outcome carries one
    pub fn reason(&self) -> Option<&str> {
        match self {
            RunOutcome::DeleteFailed(reason) | RunOutcome::VerifyError(reason) => Some(reason),
            RunOutcome::VerifyTimeout => Some("still present after verification timeout"),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Deleted(how) => write!(f, "{} ({how})", self.kind()),
            RunOutcome::DeleteFailed(reason) | RunOutcome::VerifyError(reason) => {
                write!(f, "{}: {reason}", self.kind())
            }
            _ => write!(f, "{}", self.kind()),
        }
    }
}
