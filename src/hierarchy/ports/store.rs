//! Store port for forest persistence with optimistic concurrency control.

use crate::hierarchy::domain::{ForestChanges, OwnerId, Space, SpaceId, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key of a versioned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordKey {
    /// A task record.
    Task(TaskId),
    /// A space record.
    Space(SpaceId),
}

/// The version a batch expects one record to have at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    /// Record the expectation covers.
    pub key: RecordKey,
    /// Version observed when the record entered the working set; `None`
    /// means the record must still be absent.
    pub expected: Option<u64>,
}

/// One record write within a batch.
#[derive(Debug, Clone)]
pub enum RecordPut {
    /// Write a task record.
    Task(Task),
    /// Write a space record.
    Space(Space),
}

/// The atomic commit unit.
///
/// The store verifies every precondition against its current state, then
/// applies every put and delete, all or nothing. Any stale precondition
/// fails the whole batch with [`StoreError::Conflict`] and writes nothing.
/// Preconditions cover the full working set, not only written records, so
/// a plan computed from records a concurrent commit has since changed can
/// never land.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Expected versions for every record the operation read or created.
    pub preconditions: Vec<Precondition>,
    /// Records to write.
    pub puts: Vec<RecordPut>,
    /// Task records to remove.
    pub deletes: Vec<TaskId>,
}

impl WriteBatch {
    /// Builds the batch for a drained set of forest changes.
    #[must_use]
    pub fn from_changes(changes: &ForestChanges) -> Self {
        let mut batch = Self::default();
        for (id, expected) in &changes.task_baseline {
            batch.preconditions.push(Precondition {
                key: RecordKey::Task(*id),
                expected: *expected,
            });
        }
        for (id, expected) in &changes.space_baseline {
            batch.preconditions.push(Precondition {
                key: RecordKey::Space(*id),
                expected: *expected,
            });
        }
        for task in &changes.tasks {
            batch.puts.push(RecordPut::Task(task.clone()));
        }
        for space in &changes.spaces {
            batch.puts.push(RecordPut::Space(space.clone()));
        }
        batch.deletes = changes.deleted.clone();
        batch
    }

    /// `true` when the batch writes or deletes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Forest persistence contract.
#[async_trait]
pub trait ForestStore: Send + Sync {
    /// Finds a task by id, archived records included.
    ///
    /// Returns `None` when the task does not exist.
    async fn task(&self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Finds a space by id.
    ///
    /// Returns `None` when the space does not exist.
    async fn space(&self, id: SpaceId) -> StoreResult<Option<Space>>;

    /// Returns every task whose ancestor path contains `id` — the
    /// descendant closure used by propagating operations.
    async fn tasks_with_ancestor(&self, id: TaskId) -> StoreResult<Vec<Task>>;

    /// Returns every non-archived task linked to the space.
    async fn tasks_in_space(&self, id: SpaceId) -> StoreResult<Vec<Task>>;

    /// Returns every task owned by `owner`, archived records included.
    async fn tasks_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Task>>;

    /// Returns every space owned by `owner`.
    async fn spaces_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Space>>;

    /// Returns archived tasks whose `archived_at` is strictly before the
    /// cutoff.
    async fn archived_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Task>>;

    /// Atomically applies a write batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when any precondition is stale; no
    /// write is applied in that case.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Permanently removes the given task records, skipping ids that no
    /// longer exist. Returns the number actually removed.
    async fn purge(&self, ids: &[TaskId]) -> StoreResult<usize>;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A precondition no longer matched the stored state.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Builds a conflict for the given record key.
    #[must_use]
    pub fn conflict_on(key: RecordKey) -> Self {
        match key {
            RecordKey::Task(id) => Self::Conflict(format!("task {id} changed concurrently")),
            RecordKey::Space(id) => Self::Conflict(format!("space {id} changed concurrently")),
        }
    }
}
