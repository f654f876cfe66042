//! The hierarchy mutation core.
//!
//! A [`TaskForest`] is the working set one operation may touch: the targeted
//! task, its old and new containers, and (for propagating operations) its
//! descendant closure. The server engine loads a fresh forest from the store
//! for every transaction attempt; the optimistic mirror holds its entire
//! local state as one long-lived forest. Both sides drive mutations through
//! the same methods here, so a client prediction can only diverge from the
//! server outcome when the underlying data changed in between.
//!
//! Every mutation validates before writing: a returned error guarantees the
//! forest is unchanged. Cascades walk the stored `subtasks` adjacency with an
//! explicit worklist rather than recursion, and ancestor paths are rebuilt
//! from the parent chain rather than patched, which keeps legacy structures
//! deeper than the current nesting bound internally consistent when moved.

use super::{
    HierarchyError, HierarchyResult, OwnerId, Placement, Space, SpaceId, Task, TaskId, TaskPatch,
    TaskSeed, placement,
};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum ancestor-path length the engine will create. A root task has an
/// empty path and a subtask a single entry; attaching always targets a root
/// parent, so no path the engine writes ever exceeds this.
pub const NESTING_LIMIT: usize = 1;

/// A loaded set of tasks and spaces with pure structural operations.
#[derive(Debug, Clone, Default)]
pub struct TaskForest {
    tasks: BTreeMap<TaskId, Task>,
    spaces: BTreeMap<SpaceId, Space>,
    task_baseline: BTreeMap<TaskId, u64>,
    space_baseline: BTreeMap<SpaceId, u64>,
    dirty_tasks: BTreeSet<TaskId>,
    dirty_spaces: BTreeSet<SpaceId>,
    deleted: BTreeSet<TaskId>,
}

/// Everything one committed operation changed, drained from the forest.
///
/// `tasks` and `spaces` carry post-commit versions; `deleted` lists removed
/// task ids. The service turns this into both the store's write batch and
/// the caller-facing mutated-record set.
#[derive(Debug, Clone, Default)]
pub struct ForestChanges {
    /// Records written by the operation, versions already advanced.
    pub tasks: Vec<Task>,
    /// Spaces written by the operation, versions already advanced.
    pub spaces: Vec<Space>,
    /// Tasks removed outright.
    pub deleted: Vec<TaskId>,
    /// Version each loaded task had when it entered the working set.
    pub task_baseline: Vec<(TaskId, Option<u64>)>,
    /// Version each loaded space had when it entered the working set.
    pub space_baseline: Vec<(SpaceId, Option<u64>)>,
}

/// A structural invariant did not hold while verifying a forest.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("hierarchy invariant violated: {0}")]
pub struct ConsistencyViolation(pub String);

impl TaskForest {
    /// Creates an empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an existing task into the working set, recording its current
    /// version as the commit precondition.
    pub fn load_task(&mut self, task: Task) {
        self.task_baseline.insert(task.id, task.version);
        self.tasks.insert(task.id, task);
    }

    /// Loads an existing space into the working set, recording its current
    /// version as the commit precondition.
    pub fn load_space(&mut self, space: Space) {
        self.space_baseline.insert(space.id, space.version);
        self.spaces.insert(space.id, space);
    }

    /// Returns the task with the given id, archived records included.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Returns the space with the given id.
    #[must_use]
    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.get(&id)
    }

    /// Returns `true` when the forest holds the task.
    #[must_use]
    pub fn contains_task(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Iterates over every task in the forest.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Iterates over every space in the forest.
    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.spaces.values()
    }

    /// Returns the ids of `root` plus its entire descendant subtree, walked
    /// through the stored `subtasks` adjacency with an explicit worklist.
    /// A task reached twice (corrupt adjacency) is collected once.
    #[must_use]
    pub fn subtree_ids(&self, root: TaskId) -> Vec<TaskId> {
        let mut collected = Vec::new();
        let mut seen = BTreeSet::new();
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(task) = self.tasks.get(&id) else {
                continue;
            };
            collected.push(id);
            for child in task.subtasks.iter().rev() {
                worklist.push(*child);
            }
        }
        collected
    }

    /// Returns descendants of `root` (excluding `root`) whose progress is
    /// not terminal. Used for the archive business precondition.
    #[must_use]
    pub fn incomplete_descendants(&self, root: TaskId) -> Vec<TaskId> {
        self.subtree_ids(root)
            .into_iter()
            .filter(|id| *id != root)
            .filter(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|task| !task.progress.is_terminal())
            })
            .collect()
    }

    fn require_task(&self, id: TaskId) -> HierarchyResult<&Task> {
        self.tasks
            .get(&id)
            .filter(|task| !task.archived)
            .ok_or(HierarchyError::TaskNotFound(id))
    }

    pub(crate) fn require_owned_task(&self, id: TaskId, actor: OwnerId) -> HierarchyResult<&Task> {
        let task = self.require_task(id)?;
        if task.owner != actor {
            return Err(HierarchyError::Unauthorized(format!("task {id}")));
        }
        Ok(task)
    }

    pub(crate) fn require_owned_space(
        &self,
        id: SpaceId,
        actor: OwnerId,
    ) -> HierarchyResult<&Space> {
        let space = self
            .spaces
            .get(&id)
            .ok_or(HierarchyError::SpaceNotFound(id))?;
        if space.owner != actor {
            return Err(HierarchyError::Unauthorized(format!("space {id}")));
        }
        Ok(space)
    }

    fn mark_task_dirty(&mut self, id: TaskId) {
        self.dirty_tasks.insert(id);
    }

    fn mark_space_dirty(&mut self, id: SpaceId) {
        self.dirty_spaces.insert(id);
    }

    /// Registers a brand-new space created by this operation.
    pub fn add_new_space(&mut self, space: Space) {
        self.dirty_spaces.insert(space.id);
        self.spaces.insert(space.id, space);
    }

    /// Creates a root task in `seed.space`, inserted at the front of the
    /// space's `task_order` with a freshly allocated stacking index.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] for an empty name,
    /// [`HierarchyError::SpaceNotFound`] / [`HierarchyError::Unauthorized`]
    /// for a missing or foreign space.
    pub fn create_root_task(
        &mut self,
        actor: OwnerId,
        seed: TaskSeed,
        clock: &impl Clock,
    ) -> HierarchyResult<TaskId> {
        validate_name(&seed.name)?;
        self.require_owned_space(seed.space, actor)?;
        if self.tasks.contains_key(&seed.id) {
            return Err(HierarchyError::Validation(format!(
                "task id {} already exists",
                seed.id
            )));
        }

        let space_id = seed.space;
        let mut task = Task::new(seed, clock);
        task.owner = actor;
        let Some(space) = self.spaces.get_mut(&space_id) else {
            return Err(HierarchyError::SpaceNotFound(space_id));
        };
        task.position.z_index = space.allocate_z();
        placement::insert(&mut space.task_order, task.id, Placement::Start);
        space.touch(clock);

        let id = task.id;
        self.tasks.insert(id, task);
        self.mark_task_dirty(id);
        self.mark_space_dirty(space_id);
        Ok(id)
    }

    /// Creates a subtask under `parent` at the requested placement.
    ///
    /// The parent must itself be a root task; nesting beneath a subtask
    /// would create a third level and is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::DepthViolation`] when the parent is not a
    /// root task, plus the creation errors of
    /// [`create_root_task`](Self::create_root_task).
    pub fn create_subtask(
        &mut self,
        actor: OwnerId,
        mut seed: TaskSeed,
        parent: TaskId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<TaskId> {
        validate_name(&seed.name)?;
        let parent_record = self.require_owned_task(parent, actor)?;
        if !parent_record.ancestors.is_empty() {
            return Err(HierarchyError::DepthViolation(format!(
                "cannot nest under {parent}: it is already a subtask"
            )));
        }
        let chain = ancestor_chain(parent_record);
        let space_id = space_of(parent_record)?;
        seed.space = space_id;
        self.require_owned_space(space_id, actor)?;
        if self.tasks.contains_key(&seed.id) {
            return Err(HierarchyError::Validation(format!(
                "task id {} already exists",
                seed.id
            )));
        }

        let mut task = Task::new(seed, clock);
        task.owner = actor;
        task.parent_task = Some(parent);
        task.ancestors = chain;
        let Some(space) = self.spaces.get_mut(&space_id) else {
            return Err(HierarchyError::SpaceNotFound(space_id));
        };
        task.position.z_index = space.allocate_z();
        space.touch(clock);

        let id = task.id;
        self.tasks.insert(id, task);
        if let Some(parent_mut) = self.tasks.get_mut(&parent) {
            placement::insert(&mut parent_mut.subtasks, id, target);
            parent_mut.touch(clock);
        }
        self.mark_task_dirty(id);
        self.mark_task_dirty(parent);
        self.mark_space_dirty(space_id);
        Ok(id)
    }

    /// Applies a content patch to a task. Structure is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] when the patched name is empty
    /// after trimming, or lookup/ownership errors.
    pub fn update_task(
        &mut self,
        actor: OwnerId,
        id: TaskId,
        patch: TaskPatch,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        self.require_owned_task(id, actor)?;
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        let Some(task) = self.tasks.get_mut(&id) else {
            return Err(HierarchyError::TaskNotFound(id));
        };
        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(progress) = patch.progress {
            task.progress = progress;
        }
        if let Some(position) = patch.position {
            task.position = position;
        }
        if let Some(size) = patch.size {
            task.size = size;
        }
        task.touch(clock);
        self.mark_task_dirty(id);
        Ok(())
    }

    /// Makes `task` a subtask of `parent` at the requested placement.
    ///
    /// The mover may currently be a root task or a subtask of another
    /// parent; either way it must be childless, and the target parent must
    /// be a root task — both checked at mutation time, so the two-level
    /// bound can never grow through this operation. The mover's descendants
    /// (present only in legacy structures) have their ancestor paths and
    /// space references rebuilt from the new chain.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::DepthViolation`] when the parent is a
    /// subtask or the mover has children, [`HierarchyError::Validation`]
    /// for a self-parent, and lookup/ownership errors otherwise.
    pub fn attach(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        parent: TaskId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        if task == parent {
            return Err(HierarchyError::Validation(format!(
                "task {task} cannot become its own parent"
            )));
        }
        let mover = self.require_owned_task(task, actor)?;
        if mover.has_children() {
            return Err(HierarchyError::DepthViolation(format!(
                "cannot nest {task}: it has subtasks of its own"
            )));
        }
        let parent_record = self.require_owned_task(parent, actor)?;
        if !parent_record.ancestors.is_empty() {
            return Err(HierarchyError::DepthViolation(format!(
                "cannot nest under {parent}: it is already a subtask"
            )));
        }
        let chain = ancestor_chain(parent_record);
        let destination_space = space_of(parent_record)?;

        self.unlink_from_container(task, clock);
        if let Some(parent_mut) = self.tasks.get_mut(&parent) {
            placement::insert(&mut parent_mut.subtasks, task, target);
            parent_mut.touch(clock);
        }
        if let Some(mover_mut) = self.tasks.get_mut(&task) {
            mover_mut.parent_task = Some(parent);
            mover_mut.ancestors = chain;
            mover_mut.space = Some(destination_space);
            mover_mut.touch(clock);
        }
        self.mark_task_dirty(task);
        self.mark_task_dirty(parent);
        self.refresh_descendant_paths(task, clock);
        Ok(())
    }

    /// Converts a subtask back into a root task.
    ///
    /// The task lands at the front of the destination space's `task_order`
    /// (`to_space`, defaulting to the task's current space) with a cleared
    /// ancestor path; descendants are rebuilt as in [`attach`](Self::attach).
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] when the task has no parent,
    /// and lookup/ownership errors otherwise.
    pub fn detach(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        to_space: Option<SpaceId>,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        let mover = self.require_owned_task(task, actor)?;
        if mover.parent_task.is_none() {
            return Err(HierarchyError::Validation(format!(
                "task {task} is not a subtask"
            )));
        }
        let destination = match to_space {
            Some(explicit) => explicit,
            None => space_of(mover)?,
        };
        self.require_owned_space(destination, actor)?;

        self.unlink_from_container(task, clock);
        if let Some(space) = self.spaces.get_mut(&destination) {
            placement::insert(&mut space.task_order, task, Placement::Start);
            space.touch(clock);
        }
        if let Some(mover_mut) = self.tasks.get_mut(&task) {
            mover_mut.parent_task = None;
            mover_mut.ancestors.clear();
            mover_mut.space = Some(destination);
            mover_mut.touch(clock);
        }
        self.mark_task_dirty(task);
        self.mark_space_dirty(destination);
        self.refresh_descendant_paths(task, clock);
        Ok(())
    }

    /// Archives `task` and its entire descendant subtree.
    ///
    /// The cascade root is unlinked from its parent or space ordering; every
    /// record in the subtree then loses its structural links. The business
    /// precondition (descendants complete) is the caller's to enforce —
    /// [`MutationIntent::apply`](super::MutationIntent) checks it on both
    /// the server and the mirror path.
    ///
    /// # Errors
    ///
    /// Returns lookup/ownership errors for the cascade root.
    pub fn archive_cascade(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        clock: &impl Clock,
    ) -> HierarchyResult<Vec<TaskId>> {
        self.require_owned_task(task, actor)?;
        self.unlink_from_container(task, clock);

        let archived_at = clock.utc();
        let mut archived = Vec::new();
        let mut worklist = vec![task];
        while let Some(id) = worklist.pop() {
            let Some(record) = self.tasks.get_mut(&id) else {
                continue;
            };
            for child in record.subtasks.iter().rev() {
                worklist.push(*child);
            }
            record.sever_for_archive(archived_at);
            archived.push(id);
            self.mark_task_dirty(id);
        }
        Ok(archived)
    }

    /// Deletes `task` and its entire descendant subtree, depth first.
    ///
    /// # Errors
    ///
    /// Returns lookup/ownership errors for the cascade root.
    pub fn delete_cascade(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        clock: &impl Clock,
    ) -> HierarchyResult<Vec<TaskId>> {
        self.require_owned_task(task, actor)?;
        self.unlink_from_container(task, clock);

        let mut removed = Vec::new();
        let mut worklist = vec![task];
        while let Some(id) = worklist.pop() {
            let Some(record) = self.tasks.remove(&id) else {
                continue;
            };
            for child in record.subtasks.iter().rev() {
                worklist.push(*child);
            }
            self.dirty_tasks.remove(&id);
            self.deleted.insert(id);
            removed.push(id);
        }
        Ok(removed)
    }

    /// Moves a root task within its space's `task_order`.
    ///
    /// A pure permutation: membership is unchanged, only the sequence moves.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::TaskNotFound`] when the task is not in the
    /// ordering, and space lookup/ownership errors otherwise.
    pub fn reorder_tasks(
        &mut self,
        actor: OwnerId,
        space: SpaceId,
        task: TaskId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        self.require_owned_space(space, actor)?;
        let Some(record) = self.spaces.get_mut(&space) else {
            return Err(HierarchyError::SpaceNotFound(space));
        };
        if !placement::resequence(&mut record.task_order, task, target) {
            return Err(HierarchyError::TaskNotFound(task));
        }
        record.touch(clock);
        self.mark_space_dirty(space);
        Ok(())
    }

    /// Moves a subtask within its parent's `subtasks`.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::TaskNotFound`] when the task is not among
    /// the parent's children, and lookup/ownership errors otherwise.
    pub fn reorder_subtasks(
        &mut self,
        actor: OwnerId,
        parent: TaskId,
        task: TaskId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        self.require_owned_task(parent, actor)?;
        let Some(record) = self.tasks.get_mut(&parent) else {
            return Err(HierarchyError::TaskNotFound(parent));
        };
        if !placement::resequence(&mut record.subtasks, task, target) {
            return Err(HierarchyError::TaskNotFound(task));
        }
        record.touch(clock);
        self.mark_task_dirty(parent);
        Ok(())
    }

    /// Moves a root task between (or within) spaces.
    ///
    /// `from_space` is the space the caller believes the task is in; a
    /// mismatch with the stored state means the caller raced a concurrent
    /// move and is rejected with [`HierarchyError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Conflict`] on a declared-position mismatch,
    /// and lookup/ownership errors otherwise.
    pub fn move_task(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        from_space: SpaceId,
        to_space: SpaceId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        let mover = self.require_owned_task(task, actor)?;
        if !mover.is_root() || mover.space != Some(from_space) {
            return Err(HierarchyError::Conflict(format!(
                "task {task} is not a root task of space {from_space}"
            )));
        }
        self.require_owned_space(from_space, actor)?;
        self.require_owned_space(to_space, actor)?;

        if from_space == to_space {
            return self.reorder_tasks(actor, to_space, task, target, clock);
        }

        if let Some(origin) = self.spaces.get_mut(&from_space) {
            placement::remove(&mut origin.task_order, task);
            origin.touch(clock);
        }
        if let Some(destination) = self.spaces.get_mut(&to_space) {
            placement::insert(&mut destination.task_order, task, target);
            destination.touch(clock);
        }
        if let Some(mover_mut) = self.tasks.get_mut(&task) {
            mover_mut.space = Some(to_space);
            mover_mut.touch(clock);
        }
        self.mark_task_dirty(task);
        self.mark_space_dirty(from_space);
        self.mark_space_dirty(to_space);
        self.refresh_descendant_paths(task, clock);
        Ok(())
    }

    /// Moves a subtask between (or within) parents.
    ///
    /// `from_parent` is the parent the caller believes the task is under; a
    /// mismatch is a [`HierarchyError::Conflict`]. Cross-parent moves
    /// revalidate the attach rules (root-task target, childless mover).
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Conflict`] on a declared-position mismatch,
    /// [`HierarchyError::DepthViolation`] per the attach rules, and
    /// lookup/ownership errors otherwise.
    pub fn move_subtask(
        &mut self,
        actor: OwnerId,
        task: TaskId,
        from_parent: TaskId,
        to_parent: TaskId,
        target: Placement,
        clock: &impl Clock,
    ) -> HierarchyResult<()> {
        let mover = self.require_owned_task(task, actor)?;
        if mover.parent_task != Some(from_parent) {
            return Err(HierarchyError::Conflict(format!(
                "task {task} is not a subtask of {from_parent}"
            )));
        }
        self.require_owned_task(from_parent, actor)?;

        if from_parent == to_parent {
            return self.reorder_subtasks(actor, to_parent, task, target, clock);
        }
        self.attach(actor, task, to_parent, target, clock)
    }

    /// Removes `task` from whichever ordering currently contains it: its
    /// parent's `subtasks` for a subtask, its space's `task_order` for a
    /// root task.
    fn unlink_from_container(&mut self, task: TaskId, clock: &impl Clock) {
        let (parent, space) = match self.tasks.get(&task) {
            Some(record) => (record.parent_task, record.space),
            None => return,
        };
        if let Some(parent_id) = parent {
            if let Some(parent_mut) = self.tasks.get_mut(&parent_id)
                && placement::remove(&mut parent_mut.subtasks, task)
            {
                parent_mut.touch(clock);
                self.mark_task_dirty(parent_id);
            }
            return;
        }
        if let Some(space_id) = space
            && let Some(space_mut) = self.spaces.get_mut(&space_id)
            && placement::remove(&mut space_mut.task_order, task)
        {
            space_mut.touch(clock);
            self.mark_space_dirty(space_id);
        }
    }

    /// Rebuilds ancestor paths and space references for every loaded
    /// descendant of `root` from the parent chain downwards.
    ///
    /// Equivalent to replacing the stored ancestor prefix up to `root` with
    /// the root's new chain while keeping each descendant's relative suffix;
    /// rebuilding from adjacency avoids prefix arithmetic and repairs legacy
    /// paths in the same pass.
    fn refresh_descendant_paths(&mut self, root: TaskId, clock: &impl Clock) {
        let mut worklist = vec![root];
        while let Some(parent_id) = worklist.pop() {
            let (chain, space, children) = match self.tasks.get(&parent_id) {
                Some(parent) => (
                    ancestor_chain(parent),
                    parent.space,
                    parent.subtasks.clone(),
                ),
                None => continue,
            };
            for child_id in children {
                let Some(child) = self.tasks.get_mut(&child_id) else {
                    continue;
                };
                if child.ancestors != chain || child.space != space {
                    child.ancestors = chain.clone();
                    child.space = space;
                    child.touch(clock);
                    self.mark_task_dirty(child_id);
                }
                worklist.push(child_id);
            }
        }
    }

    /// Registers a freshly cloned task produced by duplication.
    pub(crate) fn add_clone(&mut self, task: Task) {
        self.dirty_tasks.insert(task.id);
        self.tasks.insert(task.id, task);
    }

    /// Inserts a clone immediately after its original in whichever
    /// ordering contains the original.
    pub(crate) fn link_clone_beside(
        &mut self,
        original: TaskId,
        clone: TaskId,
        clock: &impl Clock,
    ) {
        let (parent, space) = match self.tasks.get(&original) {
            Some(source) => (source.parent_task, source.space),
            None => return,
        };
        if let Some(parent_id) = parent {
            if let Some(parent_mut) = self.tasks.get_mut(&parent_id) {
                placement::insert(&mut parent_mut.subtasks, clone, Placement::after(original));
                parent_mut.touch(clock);
                self.mark_task_dirty(parent_id);
            }
            return;
        }
        if let Some(space_id) = space
            && let Some(space_mut) = self.spaces.get_mut(&space_id)
        {
            placement::insert(&mut space_mut.task_order, clone, Placement::after(original));
            space_mut.touch(clock);
            self.mark_space_dirty(space_id);
        }
    }

    /// Raises a space's stacking high-water mark to cover `z`, if the
    /// space is loaded and the mark is below it.
    pub(crate) fn raise_space_watermark(&mut self, space: SpaceId, z: i64, clock: &impl Clock) {
        if let Some(record) = self.spaces.get_mut(&space)
            && record.max_z_index < z
        {
            record.raise_z_watermark(z);
            record.touch(clock);
            self.mark_space_dirty(space);
        }
    }

    /// Removes a task record and all its tracking state without emitting a
    /// delete.
    ///
    /// Reconciliation-only: the mirror evicts records the server reports
    /// deleted, where no write of that id will ever follow.
    pub(crate) fn evict_task(&mut self, id: TaskId) {
        self.tasks.remove(&id);
        self.task_baseline.remove(&id);
        self.dirty_tasks.remove(&id);
        self.deleted.remove(&id);
    }

    /// Drains the accumulated changes, advancing the version of every dirty
    /// record. The forest afterwards reflects the post-commit state.
    #[must_use]
    pub fn take_changes(&mut self) -> ForestChanges {
        let mut changes = ForestChanges::default();
        for id in std::mem::take(&mut self.dirty_tasks) {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.bump_version();
                changes.tasks.push(task.clone());
            }
        }
        for id in std::mem::take(&mut self.dirty_spaces) {
            if let Some(space) = self.spaces.get_mut(&id) {
                space.bump_version();
                changes.spaces.push(space.clone());
            }
        }
        for id in std::mem::take(&mut self.deleted) {
            // A record created and deleted within the same working set was
            // never visible outside it.
            if self.task_baseline.contains_key(&id) {
                changes.deleted.push(id);
            }
        }
        changes.task_baseline = self
            .task_baseline
            .iter()
            .map(|(id, version)| (*id, Some(*version)))
            .collect();
        for task in &changes.tasks {
            if !self.task_baseline.contains_key(&task.id) {
                changes.task_baseline.push((task.id, None));
            }
        }
        changes.space_baseline = self
            .space_baseline
            .iter()
            .map(|(id, version)| (*id, Some(*version)))
            .collect();
        for space in &changes.spaces {
            if !self.space_baseline.contains_key(&space.id) {
                changes.space_baseline.push((space.id, None));
            }
        }
        changes
    }

    /// Verifies the structural invariants over every loaded record.
    ///
    /// Intended for tests and diagnostics: the engine never needs to call
    /// this because mutations preserve the invariants by construction.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConsistencyViolation`] found.
    pub fn verify_consistency(&self) -> Result<(), ConsistencyViolation> {
        for task in self.tasks.values() {
            if task.archived {
                self.verify_archived(task)?;
            } else {
                self.verify_linked(task)?;
            }
            let mut seen = BTreeSet::new();
            for child_id in &task.subtasks {
                if !seen.insert(*child_id) {
                    return Err(ConsistencyViolation(format!(
                        "task {} lists child {child_id} twice",
                        task.id
                    )));
                }
                let child = self.tasks.get(child_id).ok_or_else(|| {
                    ConsistencyViolation(format!(
                        "task {} lists missing child {child_id}",
                        task.id
                    ))
                })?;
                if child.parent_task != Some(task.id) {
                    return Err(ConsistencyViolation(format!(
                        "child {child_id} does not point back at parent {}",
                        task.id
                    )));
                }
            }
        }
        for space in self.spaces.values() {
            let mut seen = BTreeSet::new();
            for member in &space.task_order {
                if !seen.insert(*member) {
                    return Err(ConsistencyViolation(format!(
                        "space {} lists task {member} twice",
                        space.id
                    )));
                }
                let task = self.tasks.get(member).ok_or_else(|| {
                    ConsistencyViolation(format!(
                        "space {} lists missing task {member}",
                        space.id
                    ))
                })?;
                if task.archived || !task.is_root() || task.space != Some(space.id) {
                    return Err(ConsistencyViolation(format!(
                        "task {member} does not belong in the order of space {}",
                        space.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn verify_archived(&self, task: &Task) -> Result<(), ConsistencyViolation> {
        if task.parent_task.is_some()
            || task.space.is_some()
            || !task.subtasks.is_empty()
            || !task.ancestors.is_empty()
        {
            return Err(ConsistencyViolation(format!(
                "archived task {} still holds structural links",
                task.id
            )));
        }
        Ok(())
    }

    fn verify_linked(&self, task: &Task) -> Result<(), ConsistencyViolation> {
        match task.parent_task {
            Some(parent_id) => {
                let parent = self.tasks.get(&parent_id).ok_or_else(|| {
                    ConsistencyViolation(format!(
                        "task {} points at missing parent {parent_id}",
                        task.id
                    ))
                })?;
                if parent.archived {
                    return Err(ConsistencyViolation(format!(
                        "task {} points at archived parent {parent_id}",
                        task.id
                    )));
                }
                if !parent.subtasks.contains(&task.id) {
                    return Err(ConsistencyViolation(format!(
                        "parent {parent_id} does not list child {}",
                        task.id
                    )));
                }
                if task.ancestors != ancestor_chain(parent) {
                    return Err(ConsistencyViolation(format!(
                        "task {} has a stale ancestor path",
                        task.id
                    )));
                }
            }
            None => {
                if !task.ancestors.is_empty() {
                    return Err(ConsistencyViolation(format!(
                        "root task {} carries an ancestor path",
                        task.id
                    )));
                }
                let space_id = task.space.ok_or_else(|| {
                    ConsistencyViolation(format!("root task {} has no space", task.id))
                })?;
                let in_order = self
                    .spaces
                    .get(&space_id)
                    .is_some_and(|space| space.task_order.contains(&task.id));
                if self.spaces.contains_key(&space_id) && !in_order {
                    return Err(ConsistencyViolation(format!(
                        "root task {} is missing from the order of space {space_id}",
                        task.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The ancestor path a child of `parent` must carry.
fn ancestor_chain(parent: &Task) -> Vec<TaskId> {
    let mut chain = parent.ancestors.clone();
    chain.push(parent.id);
    chain
}

/// Resolves the space a linked task belongs to.
fn space_of(task: &Task) -> HierarchyResult<SpaceId> {
    task.space.ok_or_else(|| {
        HierarchyError::Validation(format!("task {} is not linked to a space", task.id))
    })
}

/// Rejects empty-after-trimming names.
fn validate_name(name: &str) -> HierarchyResult<()> {
    if name.trim().is_empty() {
        return Err(HierarchyError::Validation(
            "task name must not be empty".to_owned(),
        ));
    }
    Ok(())
}
