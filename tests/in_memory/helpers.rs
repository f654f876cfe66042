//! Shared helpers for in-memory integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use espalier::hierarchy::{
    adapters::memory::MemoryForestStore,
    domain::{
        ConsistencyViolation, IntentEffect, OwnerId, Placement, Space, SpaceId, Task, TaskForest,
        TaskId, TaskSeed,
    },
    ports::{ForestStore, RecordPut, StoreError, StoreResult, WriteBatch},
    services::{CommittedMutation, HierarchyService, Snapshot},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

/// Boxed error type for test results.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service type under test.
pub type TestService = HierarchyService<MemoryForestStore, DefaultClock>;

/// Provides a tokio runtime for async operations in tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
#[fixture]
pub fn runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Provides a fresh in-memory store for each test.
#[fixture]
pub fn store() -> MemoryForestStore {
    MemoryForestStore::new()
}

/// Provides an owning account id.
#[fixture]
pub fn owner() -> OwnerId {
    OwnerId::new()
}

/// Builds a service over a handle to the given store.
pub fn service_over(store: &MemoryForestStore) -> TestService {
    HierarchyService::new(Arc::new(store.clone()), Arc::new(DefaultClock))
}

/// Unwraps the created-space id from a commit outcome.
pub fn created_space(outcome: &CommittedMutation) -> SpaceId {
    match &outcome.effect {
        IntentEffect::SpaceCreated { space } => *space,
        other => panic!("expected a created space, got {other:?}"),
    }
}

/// Unwraps the created-task id from a commit outcome.
pub fn created_task(outcome: &CommittedMutation) -> TaskId {
    match &outcome.effect {
        IntentEffect::TaskCreated { task } => *task,
        other => panic!("expected a created task, got {other:?}"),
    }
}

/// Rebuilds a forest from a snapshot and checks every structural rule.
///
/// # Errors
///
/// Returns the first [`ConsistencyViolation`] found.
pub fn verify_account(snapshot: &Snapshot) -> Result<(), ConsistencyViolation> {
    let mut forest = TaskForest::new();
    for space in &snapshot.spaces {
        forest.load_space(space.clone());
    }
    for task in &snapshot.tasks {
        forest.load_task(task.clone());
    }
    forest.verify_consistency()
}

/// Takes a snapshot and verifies the committed state is fully consistent.
///
/// # Errors
///
/// Returns an error when the snapshot fails or a structural rule is
/// violated.
pub fn checked_snapshot(
    rt: &Runtime,
    service: &TestService,
    owner: OwnerId,
) -> Result<Snapshot, BoxError> {
    let snapshot = rt.block_on(service.snapshot(owner))?;
    verify_account(&snapshot)?;
    Ok(snapshot)
}

/// Finds a task record in a snapshot.
///
/// # Errors
///
/// Returns an error when the task is not present.
pub fn task_record(snapshot: &Snapshot, id: TaskId) -> Result<&Task, BoxError> {
    snapshot
        .tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| format!("task {id} missing from snapshot").into())
}

/// Writes pre-built task records straight into the store.
///
/// # Errors
///
/// Returns an error when the seeding commit fails.
pub fn seed_tasks(
    rt: &Runtime,
    store: &MemoryForestStore,
    tasks: Vec<Task>,
) -> Result<(), BoxError> {
    let batch = WriteBatch {
        puts: tasks.into_iter().map(RecordPut::Task).collect(),
        ..WriteBatch::default()
    };
    rt.block_on(store.commit(batch))?;
    Ok(())
}

/// Builds a severed archived task record with the given archive timestamp.
pub fn archived_task(owner: OwnerId, name: &str, archived_at: DateTime<Utc>) -> Task {
    let seed = TaskSeed::new(TaskId::new(), owner, SpaceId::new(), name);
    let mut task = Task::new(seed, &DefaultClock);
    task.sever_for_archive(archived_at);
    task
}

// ============================================================================
// Conflicting-store wrappers
// ============================================================================

/// The competing edit a [`RacingStore`] slips in ahead of the first commit.
pub struct RivalReorder {
    /// Account issuing the competing edit.
    pub owner: OwnerId,
    /// Parent whose child order the rival changes.
    pub parent: TaskId,
    /// Child the rival moves.
    pub task: TaskId,
    /// Where the rival moves it.
    pub placement: Placement,
}

/// Store wrapper that lands a competing reorder between the wrapped
/// operation's reads and its first commit, producing a genuine version
/// conflict rather than an injected error.
#[derive(Clone)]
pub struct RacingStore {
    backing: MemoryForestStore,
    rival: Arc<Mutex<Option<RivalReorder>>>,
}

impl RacingStore {
    /// Wraps `backing`, queueing one rival edit.
    pub fn new(backing: MemoryForestStore, rival: RivalReorder) -> Self {
        Self {
            backing,
            rival: Arc::new(Mutex::new(Some(rival))),
        }
    }

    fn take_rival(&self) -> StoreResult<Option<RivalReorder>> {
        let mut slot = self
            .rival
            .lock()
            .map_err(|err| StoreError::persistence(io::Error::other(err.to_string())))?;
        Ok(slot.take())
    }
}

#[async_trait]
impl ForestStore for RacingStore {
    async fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.backing.task(id).await
    }

    async fn space(&self, id: SpaceId) -> StoreResult<Option<Space>> {
        self.backing.space(id).await
    }

    async fn tasks_with_ancestor(&self, id: TaskId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_with_ancestor(id).await
    }

    async fn tasks_in_space(&self, id: SpaceId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_in_space(id).await
    }

    async fn tasks_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_for_owner(owner).await
    }

    async fn spaces_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Space>> {
        self.backing.spaces_for_owner(owner).await
    }

    async fn archived_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        self.backing.archived_before(cutoff).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if let Some(rival) = self.take_rival()? {
            let service = service_over(&self.backing);
            service
                .reorder_subtasks(rival.owner, rival.parent, rival.task, rival.placement)
                .await
                .map_err(|err| StoreError::persistence(io::Error::other(err.to_string())))?;
        }
        self.backing.commit(batch).await
    }

    async fn purge(&self, ids: &[TaskId]) -> StoreResult<usize> {
        self.backing.purge(ids).await
    }
}

/// Store wrapper whose commits always lose the write race.
#[derive(Clone)]
pub struct StubbornStore {
    backing: MemoryForestStore,
}

impl StubbornStore {
    /// Wraps `backing`; reads pass through, commits never land.
    pub fn new(backing: MemoryForestStore) -> Self {
        Self { backing }
    }
}

#[async_trait]
impl ForestStore for StubbornStore {
    async fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.backing.task(id).await
    }

    async fn space(&self, id: SpaceId) -> StoreResult<Option<Space>> {
        self.backing.space(id).await
    }

    async fn tasks_with_ancestor(&self, id: TaskId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_with_ancestor(id).await
    }

    async fn tasks_in_space(&self, id: SpaceId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_in_space(id).await
    }

    async fn tasks_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Task>> {
        self.backing.tasks_for_owner(owner).await
    }

    async fn spaces_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Space>> {
        self.backing.spaces_for_owner(owner).await
    }

    async fn archived_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        self.backing.archived_before(cutoff).await
    }

    async fn commit(&self, _batch: WriteBatch) -> StoreResult<()> {
        Err(StoreError::Conflict(
            "competing commit landed first".to_owned(),
        ))
    }

    async fn purge(&self, ids: &[TaskId]) -> StoreResult<usize> {
        self.backing.purge(ids).await
    }
}
