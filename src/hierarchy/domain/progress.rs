//! Task progress states.

use super::ParseProgressError;
use serde::{Deserialize, Serialize};

/// Progress state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    /// Work has not started.
    NotStarted,
    /// Work is underway.
    InProgress,
    /// Work is blocked on something external.
    Blocked,
    /// Work is finished.
    Complete,
}

impl Progress {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Complete => "complete",
        }
    }

    /// Returns `true` when the state permits archiving the task's parent
    /// chain (only `Complete` counts as terminal).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl TryFrom<&str> for Progress {
    type Error = ParseProgressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "complete" => Ok(Self::Complete),
            _ => Err(ParseProgressError(value.to_owned())),
        }
    }
}
