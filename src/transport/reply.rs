//! Wire replies returned from the client boundary.

use crate::hierarchy::domain::HierarchyError;
use crate::hierarchy::services::{CommittedMutation, Snapshot};
use serde::{Deserialize, Serialize};

/// Successful reply to a [`HierarchyRequest`](super::HierarchyRequest).
///
/// # Serialisation
///
/// Replies are serialised with a `reply` tag field:
///
/// ```json
/// { "reply": "mutation", "effect": { "outcome": "task_created", … }, "changes": { … } }
/// { "reply": "snapshot", "tasks": [ … ], "spaces": [ … ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum HierarchyReply {
    /// A mutation committed; carries its effect and every record it wrote,
    /// so clients can fold the changes without re-reading.
    Mutation(CommittedMutation),
    /// Full account state.
    Snapshot(Snapshot),
}

/// Wire form of a failed request.
///
/// The kind is stable and machine-matchable; the message is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error kind, e.g. `not_found` or `conflict`.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl From<&HierarchyError> for ErrorBody {
    fn from(err: &HierarchyError) -> Self {
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

impl From<HierarchyError> for ErrorBody {
    fn from(err: HierarchyError) -> Self {
        Self::from(&err)
    }
}
