//! Orchestration service for hierarchy operations.
//!
//! Each operation runs as a transaction: load the working set the intent
//! may touch, apply the intent to the in-memory forest, and commit the
//! resulting batch under the versions observed at load. Contended attempts
//! are retried from fresh reads under the intent's [`RetryPolicy`]; every
//! other failure surfaces immediately.

use super::coordinator::RetryPolicy;
use crate::hierarchy::{
    domain::{
        BoardExtent, BoardPosition, CloneIds, ClonePair, HierarchyError, HierarchyResult,
        IntentEffect, MutationIntent, OwnerId, Placement, Space, SpaceId, Task, TaskForest,
        TaskId, TaskPatch, TaskSeed,
    },
    ports::{ForestStore, StoreError, WriteBatch},
};
use mockable::Clock;
use std::sync::Arc;

/// Days an archived task is kept before the purge boundary may remove it.
pub const ARCHIVE_GRACE_DAYS: i64 = 30;

/// The mutated-record set a committed operation returns.
///
/// Records carry their post-commit versions, so callers can fold them into
/// caches without re-reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChangeSet {
    /// Task records the operation wrote.
    pub tasks: Vec<Task>,
    /// Space records the operation wrote.
    pub spaces: Vec<Space>,
    /// Task ids the operation removed.
    pub deleted: Vec<TaskId>,
    /// Original-to-clone pairs, non-empty only for duplication.
    pub clone_pairs: Vec<ClonePair>,
}

/// Outcome of one committed operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommittedMutation {
    /// What the operation did, in id terms.
    pub effect: IntentEffect,
    /// Every record it changed.
    pub changes: ChangeSet,
}

/// Full account state, for client resynchronisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Every task owned by the account, archived records included.
    pub tasks: Vec<Task>,
    /// Every space owned by the account.
    pub spaces: Vec<Space>,
}

/// Request payload for creating a root task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskParams {
    space: SpaceId,
    name: String,
    description: Option<String>,
    position: Option<BoardPosition>,
    size: Option<BoardExtent>,
}

impl NewTaskParams {
    /// Creates params with required fields.
    #[must_use]
    pub fn new(space: SpaceId, name: impl Into<String>) -> Self {
        Self {
            space,
            name: name.into(),
            description: None,
            position: None,
            size: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the board position.
    #[must_use]
    pub const fn with_position(mut self, position: BoardPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the card extent.
    #[must_use]
    pub const fn with_size(mut self, size: BoardExtent) -> Self {
        self.size = Some(size);
        self
    }
}

/// Request payload for creating a subtask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubtaskParams {
    parent: TaskId,
    placement: Placement,
    name: String,
    description: Option<String>,
    position: Option<BoardPosition>,
    size: Option<BoardExtent>,
}

impl NewSubtaskParams {
    /// Creates params with required fields.
    #[must_use]
    pub fn new(parent: TaskId, placement: Placement, name: impl Into<String>) -> Self {
        Self {
            parent,
            placement,
            name: name.into(),
            description: None,
            position: None,
            size: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the board position.
    #[must_use]
    pub const fn with_position(mut self, position: BoardPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the card extent.
    #[must_use]
    pub const fn with_size(mut self, size: BoardExtent) -> Self {
        self.size = Some(size);
        self
    }
}

enum AttemptFailure {
    Contended(String),
    Fatal(HierarchyError),
}

/// Hierarchy orchestration service.
#[derive(Clone)]
pub struct HierarchyService<S, C>
where
    S: ForestStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    propagation_policy: RetryPolicy,
    sibling_policy: RetryPolicy,
}

impl<S, C> HierarchyService<S, C>
where
    S: ForestStore,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default retry policies.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            propagation_policy: RetryPolicy::PROPAGATION,
            sibling_policy: RetryPolicy::SIBLING,
        }
    }

    /// Overrides both retry policies. Tests inject millisecond-scale ones.
    #[must_use]
    pub const fn with_policies(mut self, propagation: RetryPolicy, sibling: RetryPolicy) -> Self {
        self.propagation_policy = propagation;
        self.sibling_policy = sibling;
        self
    }

    /// Creates an empty space owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] for an empty name.
    pub async fn create_space(
        &self,
        actor: OwnerId,
        name: impl Into<String> + Send,
        color: impl Into<String> + Send,
    ) -> HierarchyResult<CommittedMutation> {
        let intent = MutationIntent::CreateSpace {
            space: SpaceId::new(),
            name: name.into(),
            color: color.into(),
        };
        self.submit(actor, intent).await
    }

    /// Creates a root task at the front of its space's order.
    ///
    /// # Errors
    ///
    /// Returns the creation errors of the domain layer.
    pub async fn create_task(
        &self,
        actor: OwnerId,
        params: NewTaskParams,
    ) -> HierarchyResult<CommittedMutation> {
        let NewTaskParams {
            space,
            name,
            description,
            position,
            size,
        } = params;
        let seed = build_seed(TaskId::new(), actor, space, name, description, position, size);
        self.submit(actor, MutationIntent::CreateTask { seed }).await
    }

    /// Creates a subtask at the requested placement under a root task.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::DepthViolation`] when the parent is itself
    /// a subtask, plus the creation errors of the domain layer.
    pub async fn create_subtask(
        &self,
        actor: OwnerId,
        params: NewSubtaskParams,
    ) -> HierarchyResult<CommittedMutation> {
        let NewSubtaskParams {
            parent,
            placement,
            name,
            description,
            position,
            size,
        } = params;
        // The seed's space is replaced by the parent's space at apply time.
        let placeholder_space = SpaceId::from_uuid(uuid::Uuid::nil());
        let seed = build_seed(
            TaskId::new(),
            actor,
            placeholder_space,
            name,
            description,
            position,
            size,
        );
        self.submit(
            actor,
            MutationIntent::CreateSubtask {
                seed,
                parent,
                placement,
            },
        )
        .await
    }

    /// Patches a task's content.
    ///
    /// # Errors
    ///
    /// Returns the lookup and validation errors of the domain layer.
    pub async fn update_task(
        &self,
        actor: OwnerId,
        task: TaskId,
        patch: TaskPatch,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(actor, MutationIntent::UpdateTask { task, patch })
            .await
    }

    /// Attaches a task beneath a root parent, or detaches it back to root
    /// level when `new_parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::DepthViolation`] when the move would
    /// exceed the nesting bound, plus lookup/ownership errors.
    pub async fn reparent(
        &self,
        actor: OwnerId,
        task: TaskId,
        new_parent: Option<TaskId>,
        placement: Placement,
        to_space: Option<SpaceId>,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(
            actor,
            MutationIntent::Reparent {
                task,
                new_parent,
                placement,
                to_space,
            },
        )
        .await
    }

    /// Archives a task and its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::BusinessRule`] when any descendant is not
    /// complete, plus lookup/ownership errors.
    pub async fn archive(
        &self,
        actor: OwnerId,
        task: TaskId,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(actor, MutationIntent::Archive { task }).await
    }

    /// Deletes a task and its descendants permanently.
    ///
    /// # Errors
    ///
    /// Returns lookup/ownership errors.
    pub async fn delete(&self, actor: OwnerId, task: TaskId) -> HierarchyResult<CommittedMutation> {
        self.submit(actor, MutationIntent::Delete { task }).await
    }

    /// Duplicates the subtrees rooted at the given tasks.
    ///
    /// # Errors
    ///
    /// Returns lookup/ownership errors for any requested root.
    pub async fn duplicate(
        &self,
        actor: OwnerId,
        roots: Vec<TaskId>,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(actor, MutationIntent::Duplicate { roots }).await
    }

    /// Re-sequences a root task within its space.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::TaskNotFound`] when the task is not in the
    /// order, plus lookup/ownership errors.
    pub async fn reorder_tasks(
        &self,
        actor: OwnerId,
        space: SpaceId,
        task: TaskId,
        placement: Placement,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(
            actor,
            MutationIntent::ReorderTasks {
                space,
                task,
                placement,
            },
        )
        .await
    }

    /// Re-sequences a subtask within its parent.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::TaskNotFound`] when the task is not among
    /// the parent's children, plus lookup/ownership errors.
    pub async fn reorder_subtasks(
        &self,
        actor: OwnerId,
        parent: TaskId,
        task: TaskId,
        placement: Placement,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(
            actor,
            MutationIntent::ReorderSubtasks {
                parent,
                task,
                placement,
            },
        )
        .await
    }

    /// Moves a root task between or within spaces.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Conflict`] when `from_space` no longer
    /// matches the stored state after retries, plus lookup errors.
    pub async fn move_task(
        &self,
        actor: OwnerId,
        task: TaskId,
        from_space: SpaceId,
        to_space: SpaceId,
        placement: Placement,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(
            actor,
            MutationIntent::MoveTask {
                task,
                from_space,
                to_space,
                placement,
            },
        )
        .await
    }

    /// Moves a subtask between or within parents.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Conflict`] when `from_parent` no longer
    /// matches the stored state after retries, plus depth and lookup
    /// errors.
    pub async fn move_subtask(
        &self,
        actor: OwnerId,
        task: TaskId,
        from_parent: TaskId,
        to_parent: TaskId,
        placement: Placement,
    ) -> HierarchyResult<CommittedMutation> {
        self.submit(
            actor,
            MutationIntent::MoveSubtask {
                task,
                from_parent,
                to_parent,
                placement,
            },
        )
        .await
    }

    /// Returns the caller's full task and space state.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Store`] on persistence failure.
    pub async fn snapshot(&self, actor: OwnerId) -> HierarchyResult<Snapshot> {
        Ok(Snapshot {
            tasks: self.store.tasks_for_owner(actor).await?,
            spaces: self.store.spaces_for_owner(actor).await?,
        })
    }

    /// Permanently removes archived tasks older than the grace window.
    /// Returns the number of records purged.
    ///
    /// Not part of the transactional surface: invoked by an external
    /// periodic trigger.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Store`] on persistence failure.
    pub async fn purge_archived(&self) -> HierarchyResult<usize> {
        let cutoff = self.clock.utc() - chrono::Duration::days(ARCHIVE_GRACE_DAYS);
        let expired = self.store.archived_before(cutoff).await?;
        let ids: Vec<TaskId> = expired.iter().map(|task| task.id).collect();
        Ok(self.store.purge(&ids).await?)
    }

    /// Runs an intent through the transaction coordinator: bounded retries
    /// from fresh reads with exponential backoff on contention.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Conflict`] once the retry budget is
    /// exhausted; every other error surfaces from the first attempt that
    /// hits it.
    pub async fn submit(
        &self,
        actor: OwnerId,
        intent: MutationIntent,
    ) -> HierarchyResult<CommittedMutation> {
        let policy = self.policy_for(&intent);
        let mut attempt: u32 = 1;
        loop {
            match self.attempt_intent(actor, &intent).await {
                Ok(committed) => return Ok(committed),
                Err(AttemptFailure::Fatal(err)) => return Err(err),
                Err(AttemptFailure::Contended(detail)) => {
                    if attempt >= policy.max_attempts {
                        return Err(HierarchyError::Conflict(detail));
                    }
                    tokio::time::sleep(policy.backoff_delay(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    const fn policy_for(&self, intent: &MutationIntent) -> RetryPolicy {
        if intent.propagates() {
            self.propagation_policy
        } else {
            self.sibling_policy
        }
    }

    async fn attempt_intent(
        &self,
        actor: OwnerId,
        intent: &MutationIntent,
    ) -> Result<CommittedMutation, AttemptFailure> {
        let mut forest = self
            .load_working_set(intent)
            .await
            .map_err(AttemptFailure::Fatal)?;
        let mut clone_ids = CloneIds::new();
        let effect = intent
            .apply(&mut forest, actor, &mut clone_ids, &*self.clock)
            .map_err(|err| match err {
                HierarchyError::Conflict(detail) => AttemptFailure::Contended(detail),
                fatal => AttemptFailure::Fatal(fatal),
            })?;

        let drained = forest.take_changes();
        let batch = WriteBatch::from_changes(&drained);
        let mut changes = ChangeSet {
            tasks: drained.tasks,
            spaces: drained.spaces,
            deleted: drained.deleted,
            clone_pairs: Vec::new(),
        };
        if let IntentEffect::Duplicated { pairs } = &effect {
            changes.clone_pairs = pairs.clone();
        }

        match self.store.commit(batch).await {
            Ok(()) => Ok(CommittedMutation { effect, changes }),
            Err(StoreError::Conflict(detail)) => Err(AttemptFailure::Contended(detail)),
            Err(other) => Err(AttemptFailure::Fatal(other.into())),
        }
    }

    /// Loads every record the intent may read or write. Records that do
    /// not exist are simply not loaded; the domain layer reports the
    /// resulting `NotFound`.
    async fn load_working_set(&self, intent: &MutationIntent) -> HierarchyResult<TaskForest> {
        let mut forest = TaskForest::new();
        match intent {
            MutationIntent::CreateSpace { .. } => {}
            MutationIntent::CreateTask { seed } => {
                self.load_space_into(&mut forest, seed.space).await?;
            }
            MutationIntent::CreateSubtask { parent, .. } => {
                self.load_task_into(&mut forest, *parent).await?;
                let parent_space = forest.task(*parent).and_then(|record| record.space);
                if let Some(space) = parent_space {
                    self.load_space_into(&mut forest, space).await?;
                }
            }
            MutationIntent::UpdateTask { task, .. } => {
                self.load_task_into(&mut forest, *task).await?;
            }
            MutationIntent::Reparent {
                task,
                new_parent,
                to_space,
                ..
            } => {
                self.load_task_with_container(&mut forest, *task).await?;
                if let Some(parent) = new_parent {
                    self.load_task_into(&mut forest, *parent).await?;
                } else {
                    let destination = match to_space {
                        Some(space) => Some(*space),
                        None => forest.task(*task).and_then(|record| record.space),
                    };
                    if let Some(space) = destination {
                        self.load_space_into(&mut forest, space).await?;
                    }
                }
                self.load_descendants(&mut forest, *task).await?;
            }
            MutationIntent::Archive { task } | MutationIntent::Delete { task } => {
                self.load_task_with_container(&mut forest, *task).await?;
                self.load_descendants(&mut forest, *task).await?;
            }
            MutationIntent::Duplicate { roots } => {
                for root in roots {
                    self.load_task_with_container(&mut forest, *root).await?;
                    let root_space = forest.task(*root).and_then(|record| record.space);
                    if let Some(space) = root_space {
                        self.load_space_into(&mut forest, space).await?;
                    }
                    self.load_descendants(&mut forest, *root).await?;
                }
            }
            MutationIntent::ReorderTasks { space, .. } => {
                self.load_space_into(&mut forest, *space).await?;
            }
            MutationIntent::ReorderSubtasks { parent, .. } => {
                self.load_task_into(&mut forest, *parent).await?;
            }
            MutationIntent::MoveTask {
                task,
                from_space,
                to_space,
                ..
            } => {
                self.load_task_into(&mut forest, *task).await?;
                self.load_space_into(&mut forest, *from_space).await?;
                if to_space != from_space {
                    self.load_space_into(&mut forest, *to_space).await?;
                    self.load_descendants(&mut forest, *task).await?;
                }
            }
            MutationIntent::MoveSubtask {
                task,
                from_parent,
                to_parent,
                ..
            } => {
                self.load_task_into(&mut forest, *task).await?;
                self.load_task_into(&mut forest, *from_parent).await?;
                if to_parent != from_parent {
                    self.load_task_into(&mut forest, *to_parent).await?;
                    self.load_descendants(&mut forest, *task).await?;
                }
            }
        }
        Ok(forest)
    }

    async fn load_task_into(&self, forest: &mut TaskForest, id: TaskId) -> HierarchyResult<()> {
        if let Some(task) = self.store.task(id).await? {
            forest.load_task(task);
        }
        Ok(())
    }

    async fn load_space_into(&self, forest: &mut TaskForest, id: SpaceId) -> HierarchyResult<()> {
        if let Some(space) = self.store.space(id).await? {
            forest.load_space(space);
        }
        Ok(())
    }

    /// Loads a task together with whichever ordering currently contains
    /// it: the parent record for a subtask, the space record for a root
    /// task.
    async fn load_task_with_container(
        &self,
        forest: &mut TaskForest,
        id: TaskId,
    ) -> HierarchyResult<()> {
        let Some(task) = self.store.task(id).await? else {
            return Ok(());
        };
        if let Some(parent) = task.parent_task {
            self.load_task_into(forest, parent).await?;
        } else if let Some(space) = task.space {
            self.load_space_into(forest, space).await?;
        }
        forest.load_task(task);
        Ok(())
    }

    async fn load_descendants(&self, forest: &mut TaskForest, id: TaskId) -> HierarchyResult<()> {
        for descendant in self.store.tasks_with_ancestor(id).await? {
            forest.load_task(descendant);
        }
        Ok(())
    }
}

fn build_seed(
    id: TaskId,
    owner: OwnerId,
    space: SpaceId,
    name: String,
    description: Option<String>,
    position: Option<BoardPosition>,
    size: Option<BoardExtent>,
) -> TaskSeed {
    let mut seed = TaskSeed::new(id, owner, space, name);
    if let Some(description) = description {
        seed = seed.with_description(description);
    }
    if let Some(position) = position {
        seed = seed.with_position(position);
    }
    if let Some(size) = size {
        seed = seed.with_size(size);
    }
    seed
}
