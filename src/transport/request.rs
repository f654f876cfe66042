//! Wire requests accepted at the client boundary.

use crate::hierarchy::domain::{Placement, SpaceId, TaskId, TaskPatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned while parsing position tokens from wire payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown position token: {0}")]
pub struct ParsePositionError(pub String);

/// Wire form of a sibling placement.
///
/// Recognised tokens are `start`, `end`, and `after:<uuid>`. Parsing is
/// case- and whitespace-tolerant; anything else is rejected before the
/// request reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionToken(pub String);

impl PositionToken {
    /// Token placing the record before every current sibling.
    #[must_use]
    pub fn start() -> Self {
        Self("start".to_owned())
    }

    /// Token placing the record after every current sibling.
    #[must_use]
    pub fn end() -> Self {
        Self("end".to_owned())
    }

    /// Token placing the record immediately after `anchor`.
    #[must_use]
    pub fn after(anchor: TaskId) -> Self {
        Self(format!("after:{anchor}"))
    }

    /// Decodes the token into a [`Placement`].
    ///
    /// # Errors
    ///
    /// Returns [`ParsePositionError`] when the token is not `start`, `end`,
    /// or `after:` followed by a well-formed UUID.
    pub fn parse(&self) -> Result<Placement, ParsePositionError> {
        let normalized = self.0.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "start" => Ok(Placement::Start),
            "end" => Ok(Placement::End),
            other => {
                let Some(anchor) = other.strip_prefix("after:") else {
                    return Err(ParsePositionError(self.0.clone()));
                };
                Uuid::parse_str(anchor.trim())
                    .map(|uuid| Placement::after(TaskId::from_uuid(uuid)))
                    .map_err(|_| ParsePositionError(self.0.clone()))
            }
        }
    }
}

impl From<Placement> for PositionToken {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Start => Self::start(),
            Placement::End => Self::end(),
            Placement::After { anchor } => Self::after(anchor),
        }
    }
}

/// A client request, one variant per hierarchy operation.
///
/// # Serialisation
///
/// Requests are serialised with an `op` tag field:
///
/// ```json
/// { "op": "create_task", "space": "0a6f…", "name": "Draft report" }
/// { "op": "reorder_tasks", "space": "0a6f…", "task": "77b1…", "position": "after:41c2…" }
/// { "op": "snapshot" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HierarchyRequest {
    /// Create an empty space.
    CreateSpace {
        /// Display name.
        name: String,
        /// Display colour.
        color: String,
    },
    /// Create a root task at the front of the space order.
    CreateTask {
        /// Space to create the task in.
        space: SpaceId,
        /// Display name.
        name: String,
        /// Optional body text.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Create a subtask under an existing root task.
    CreateSubtask {
        /// Root task to nest under.
        parent: TaskId,
        /// Position among the parent's existing subtasks.
        position: PositionToken,
        /// Display name.
        name: String,
        /// Optional body text.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Patch a task's content without touching structure.
    UpdateTask {
        /// Task to patch.
        task: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Re-home a task beneath a new parent, or detach it to root level.
    Reparent {
        /// Task being moved.
        task: TaskId,
        /// New parent, or absent to detach to root level.
        #[serde(skip_serializing_if = "Option::is_none")]
        new_parent: Option<TaskId>,
        /// Position among the new siblings.
        position: PositionToken,
        /// Destination space override for detaching.
        #[serde(skip_serializing_if = "Option::is_none")]
        to_space: Option<SpaceId>,
    },
    /// Archive a task and its descendants.
    Archive {
        /// Root of the cascade.
        task: TaskId,
    },
    /// Delete a task and its descendants.
    Delete {
        /// Root of the cascade.
        task: TaskId,
    },
    /// Duplicate the subtrees rooted at the given tasks.
    Duplicate {
        /// Subtree roots to copy.
        roots: Vec<TaskId>,
    },
    /// Re-sequence a root task within its space.
    ReorderTasks {
        /// Space whose order changes.
        space: SpaceId,
        /// Task to move.
        task: TaskId,
        /// New position.
        position: PositionToken,
    },
    /// Re-sequence a subtask within its parent.
    ReorderSubtasks {
        /// Parent whose child order changes.
        parent: TaskId,
        /// Task to move.
        task: TaskId,
        /// New position.
        position: PositionToken,
    },
    /// Move a root task between or within spaces.
    MoveTask {
        /// Task to move.
        task: TaskId,
        /// Space the caller believes currently holds the task.
        from_space: SpaceId,
        /// Destination space.
        to_space: SpaceId,
        /// Position in the destination order.
        position: PositionToken,
    },
    /// Move a subtask between or within parents.
    MoveSubtask {
        /// Task to move.
        task: TaskId,
        /// Parent the caller believes currently holds the task.
        from_parent: TaskId,
        /// Destination parent.
        to_parent: TaskId,
        /// Position among the destination siblings.
        position: PositionToken,
    },
    /// Fetch the caller's full task and space state.
    Snapshot,
}
