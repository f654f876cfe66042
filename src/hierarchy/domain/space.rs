//! The space record: an owned, ordered container of root tasks.

use super::{OwnerId, SpaceId, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A space groups root tasks for one owner and carries their display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Unique identifier.
    pub id: SpaceId,
    /// Owning user.
    pub owner: OwnerId,
    /// Display name.
    pub name: String,
    /// Display colour.
    pub color: String,
    /// Monotonic stacking counter; new tasks take `max_z_index + 1`.
    pub max_z_index: i64,
    /// Ordered root tasks. Every non-archived root task of this space
    /// appears here exactly once.
    #[serde(default)]
    pub task_order: Vec<TaskId>,
    /// Write counter; see [`Task::version`](super::Task::version).
    #[serde(default)]
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Space {
    /// Creates an empty space.
    #[must_use]
    pub fn new(
        id: SpaceId,
        owner: OwnerId,
        name: impl Into<String>,
        color: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            owner,
            name: name.into(),
            color: color.into(),
            max_z_index: 0,
            task_order: Vec::new(),
            version: 0,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Allocates the next stacking index, advancing the counter.
    pub const fn allocate_z(&mut self) -> i64 {
        self.max_z_index = self.max_z_index.saturating_add(1);
        self.max_z_index
    }

    /// Raises the stacking counter to cover `z` when a task arrives with a
    /// precomputed index (duplication lifts clones above their originals).
    pub const fn raise_z_watermark(&mut self, z: i64) {
        if z > self.max_z_index {
            self.max_z_index = z;
        }
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
