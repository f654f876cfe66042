//! The task record: a node in the bounded-depth hierarchy.

use super::{BoardExtent, BoardPosition, OwnerId, Progress, SpaceId, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A task node.
///
/// Structural fields (`space`, `parent_task`, `subtasks`, `ancestors`) are
/// edited only through [`TaskForest`](super::TaskForest) operations, which
/// keep the tree coherent; everything else is plain content carried along on
/// moves and duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, permanent once confirmed by the store.
    pub id: TaskId,
    /// Owning user; checked against the caller on every operation.
    pub owner: OwnerId,
    /// Display name; never empty after trimming.
    pub name: String,
    /// Free-text description; may be empty.
    #[serde(default)]
    pub description: String,
    /// Board placement.
    pub position: BoardPosition,
    /// Card extent.
    pub size: BoardExtent,
    /// Progress state.
    pub progress: Progress,
    /// Owning space; `None` iff the task is archived.
    pub space: Option<SpaceId>,
    /// Containing task; `None` for root tasks.
    pub parent_task: Option<TaskId>,
    /// Ordered children. Order is display order and survives every
    /// operation that does not explicitly reorder.
    #[serde(default)]
    pub subtasks: Vec<TaskId>,
    /// Materialised ancestor path from the tree root down to (excluding)
    /// this task.
    #[serde(default)]
    pub ancestors: Vec<TaskId>,
    /// Soft-delete marker.
    #[serde(default)]
    pub archived: bool,
    /// When the task was archived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Write counter; bumped on every committed mutation and used for both
    /// store-side conflict detection and mirror reconciliation.
    #[serde(default)]
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Required fields for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSeed {
    /// Identifier the new record will carry. Server-side callers mint a
    /// fresh one; the optimistic mirror supplies a provisional id here.
    pub id: TaskId,
    /// Owning user.
    pub owner: OwnerId,
    /// Space the task will live in.
    pub space: SpaceId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: String,
    /// Optional explicit position.
    pub position: Option<BoardPosition>,
    /// Optional explicit extent.
    pub size: Option<BoardExtent>,
}

impl TaskSeed {
    /// Creates a seed with required fields.
    #[must_use]
    pub fn new(id: TaskId, owner: OwnerId, space: SpaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            space,
            name: name.into(),
            description: String::new(),
            position: None,
            size: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets an explicit board position.
    #[must_use]
    pub const fn with_position(mut self, position: BoardPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets an explicit card extent.
    #[must_use]
    pub const fn with_size(mut self, size: BoardExtent) -> Self {
        self.size = Some(size);
        self
    }
}

impl Task {
    /// Creates an unlinked root-shaped task record.
    ///
    /// The caller (normally [`TaskForest`](super::TaskForest)) is
    /// responsible for linking it into a space's `task_order` or a parent's
    /// `subtasks`.
    #[must_use]
    pub fn new(seed: TaskSeed, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: seed.id,
            owner: seed.owner,
            name: seed.name,
            description: seed.description,
            position: seed.position.unwrap_or_default(),
            size: seed.size.unwrap_or_default(),
            progress: Progress::NotStarted,
            space: Some(seed.space),
            parent_task: None,
            subtasks: Vec::new(),
            ancestors: Vec::new(),
            archived: false,
            archived_at: None,
            version: 0,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns `true` when the task has no parent.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_task.is_none()
    }

    /// Returns `true` when the task has at least one child.
    #[must_use]
    pub const fn has_children(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Marks this record archived in place: severed from its space, parent,
    /// children, and ancestor chain.
    pub fn sever_for_archive(&mut self, archived_at: DateTime<Utc>) {
        self.space = None;
        self.parent_task = None;
        self.subtasks.clear();
        self.ancestors.clear();
        self.archived = true;
        self.archived_at = Some(archived_at);
        self.updated_at = archived_at;
    }

    /// Updates the `updated_at` timestamp.
    pub fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }

    /// Advances the write counter prior to commit.
    pub const fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}

/// Content patch applied by the update operation; structural fields are out
/// of reach by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New progress state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// New board position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<BoardPosition>,
    /// New card extent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<BoardExtent>,
}

impl TaskPatch {
    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.progress.is_none()
            && self.position.is_none()
            && self.size.is_none()
    }
}
