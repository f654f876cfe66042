//! Mutation intents: the operation vocabulary shared by the server engine
//! and the optimistic mirror.
//!
//! Every structural operation is expressed as one [`MutationIntent`] value.
//! The server engine applies intents to a freshly loaded working set before
//! committing; the mirror applies the same intents to its predicted forest.
//! Because both sides dispatch through [`MutationIntent::apply`], a
//! prediction can only disagree with the eventual server outcome when the
//! underlying records changed between prediction and commit — never because
//! the rules differ.

use super::{
    CloneIds, ClonePair, HierarchyError, HierarchyResult, OwnerId, Placement, Space, SpaceId,
    TaskForest, TaskId, TaskPatch, TaskSeed, duplicate,
};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

/// One structural operation, with all inputs resolved to ids.
///
/// Record ids for creations travel inside the intent (client-drawn for
/// mirror predictions, engine-drawn on the server path), so replaying an
/// intent yields the same identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIntent {
    /// Create an empty space.
    CreateSpace {
        /// Identity the new space will carry.
        space: SpaceId,
        /// Display name.
        name: String,
        /// Display colour.
        color: String,
    },
    /// Create a root task in the seed's space.
    CreateTask {
        /// Full initial state of the task.
        seed: TaskSeed,
    },
    /// Create a subtask under an existing root task.
    CreateSubtask {
        /// Full initial state of the task.
        seed: TaskSeed,
        /// Root task to nest under.
        parent: TaskId,
        /// Position among the parent's existing subtasks.
        placement: Placement,
    },
    /// Patch a task's content without touching structure.
    UpdateTask {
        /// Task to patch.
        task: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Re-home a task: attach beneath a root task, or detach back to
    /// root level.
    Reparent {
        /// Task being moved.
        task: TaskId,
        /// New parent, or `None` to detach to root level.
        new_parent: Option<TaskId>,
        /// Position among the new siblings (attach only; detached tasks
        /// land at the front of the space order).
        placement: Placement,
        /// Destination space override for detaching.
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
        /// Subtree roots to copy; descendants are included implicitly.
        roots: Vec<TaskId>,
    },
    /// Re-sequence a root task within its space.
    ReorderTasks {
        /// Space whose order changes.
        space: SpaceId,
        /// Task to move.
        task: TaskId,
        /// New position.
        placement: Placement,
    },
    /// Re-sequence a subtask within its parent.
    ReorderSubtasks {
        /// Parent whose child order changes.
        parent: TaskId,
        /// Task to move.
        task: TaskId,
        /// New position.
        placement: Placement,
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
        placement: Placement,
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
        placement: Placement,
    },
}

/// What applying an intent produced, beyond the mutated records themselves.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntentEffect {
    /// A space was created.
    SpaceCreated {
        /// The new space's id.
        space: SpaceId,
    },
    /// A task was created.
    TaskCreated {
        /// The new task's id.
        task: TaskId,
    },
    /// A task's content changed.
    Updated {
        /// The patched task.
        task: TaskId,
    },
    /// A task moved to a new parent or back to root level.
    Reparented {
        /// The moved task.
        task: TaskId,
    },
    /// A subtree was archived.
    Archived {
        /// Every archived task, cascade root first.
        tasks: Vec<TaskId>,
    },
    /// A subtree was deleted.
    Deleted {
        /// Every deleted task, cascade root first.
        tasks: Vec<TaskId>,
    },
    /// Subtrees were duplicated.
    Duplicated {
        /// Original-to-clone pairs for every copied task.
        pairs: Vec<ClonePair>,
    },
    /// A sibling ordering was permuted.
    Reordered,
    /// A task changed container.
    Moved {
        /// The moved task.
        task: TaskId,
    },
}

impl MutationIntent {
    /// Applies the intent to a forest on behalf of `actor`.
    ///
    /// `clone_ids` is consulted only by [`MutationIntent::Duplicate`]: the
    /// mirror passes each pending intent's own table so replays keep their
    /// provisional clone ids stable, the server passes a fresh one per
    /// attempt. On error the forest is unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the domain error of the underlying operation; see the
    /// individual [`TaskForest`] methods.
    pub fn apply(
        &self,
        forest: &mut TaskForest,
        actor: OwnerId,
        clone_ids: &mut CloneIds,
        clock: &impl Clock,
    ) -> HierarchyResult<IntentEffect> {
        match self {
            Self::CreateSpace { space, name, color } => {
                if name.trim().is_empty() {
                    return Err(HierarchyError::Validation(
                        "space name must not be empty".to_owned(),
                    ));
                }
                if forest.space(*space).is_some() {
                    return Err(HierarchyError::Validation(format!(
                        "space id {space} already exists"
                    )));
                }
                forest.add_new_space(Space::new(*space, actor, name.clone(), color.clone(), clock));
                Ok(IntentEffect::SpaceCreated { space: *space })
            }
            Self::CreateTask { seed } => {
                let task = forest.create_root_task(actor, seed.clone(), clock)?;
                Ok(IntentEffect::TaskCreated { task })
            }
            Self::CreateSubtask {
                seed,
                parent,
                placement,
            } => {
                let task =
                    forest.create_subtask(actor, seed.clone(), *parent, *placement, clock)?;
                Ok(IntentEffect::TaskCreated { task })
            }
            Self::UpdateTask { task, patch } => {
                forest.update_task(actor, *task, patch.clone(), clock)?;
                Ok(IntentEffect::Updated { task: *task })
            }
            Self::Reparent {
                task,
                new_parent,
                placement,
                to_space,
            } => {
                match new_parent {
                    Some(parent) => forest.attach(actor, *task, *parent, *placement, clock)?,
                    None => forest.detach(actor, *task, *to_space, clock)?,
                }
                Ok(IntentEffect::Reparented { task: *task })
            }
            Self::Archive { task } => {
                forest.require_owned_task(*task, actor)?;
                let incomplete = forest.incomplete_descendants(*task);
                if !incomplete.is_empty() {
                    return Err(HierarchyError::BusinessRule(format!(
                        "cannot archive {task}: {} subtask(s) are not complete",
                        incomplete.len()
                    )));
                }
                let tasks = forest.archive_cascade(actor, *task, clock)?;
                Ok(IntentEffect::Archived { tasks })
            }
            Self::Delete { task } => {
                let tasks = forest.delete_cascade(actor, *task, clock)?;
                Ok(IntentEffect::Deleted { tasks })
            }
            Self::Duplicate { roots } => {
                let mut batch = BTreeSet::new();
                for root in roots {
                    forest.require_owned_task(*root, actor)?;
                    batch.extend(forest.subtree_ids(*root));
                }
                let pairs = duplicate::duplicate_batch(forest, actor, &batch, clone_ids, clock)?;
                Ok(IntentEffect::Duplicated { pairs })
            }
            Self::ReorderTasks {
                space,
                task,
                placement,
            } => {
                forest.reorder_tasks(actor, *space, *task, *placement, clock)?;
                Ok(IntentEffect::Reordered)
            }
            Self::ReorderSubtasks {
                parent,
                task,
                placement,
            } => {
                forest.reorder_subtasks(actor, *parent, *task, *placement, clock)?;
                Ok(IntentEffect::Reordered)
            }
            Self::MoveTask {
                task,
                from_space,
                to_space,
                placement,
            } => {
                forest.move_task(actor, *task, *from_space, *to_space, *placement, clock)?;
                Ok(IntentEffect::Moved { task: *task })
            }
            Self::MoveSubtask {
                task,
                from_parent,
                to_parent,
                placement,
            } => {
                forest.move_subtask(actor, *task, *from_parent, *to_parent, *placement, clock)?;
                Ok(IntentEffect::Moved { task: *task })
            }
        }
    }

    /// `true` for operations whose effects can span a whole subtree or
    /// cross containers. The transaction coordinator grants these a longer
    /// retry budget than single-ordering operations.
    #[must_use]
    pub const fn propagates(&self) -> bool {
        matches!(
            self,
            Self::Reparent { .. }
                | Self::Archive { .. }
                | Self::Delete { .. }
                | Self::Duplicate { .. }
                | Self::MoveTask { .. }
                | Self::MoveSubtask { .. }
        )
    }

    /// Ids this intent brings into existence when applied: creation seeds
    /// and the clone ids already drawn in `clone_ids`.
    ///
    /// The mirror uses this to tag records as provisional until the server
    /// confirms them.
    #[must_use]
    pub fn introduced_ids(&self, clone_ids: &CloneIds) -> Vec<TaskId> {
        match self {
            Self::CreateTask { seed } | Self::CreateSubtask { seed, .. } => vec![seed.id],
            Self::Duplicate { .. } => clone_ids.clone_ids(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every id reference through the remap tables; ids absent
    /// from a table are left alone.
    ///
    /// The mirror applies this to still-pending intents when earlier
    /// provisional ids resolve to their server-issued canonical ones, so
    /// replays target the confirmed records.
    pub(crate) fn remap_ids(
        &mut self,
        tasks: &BTreeMap<TaskId, TaskId>,
        spaces: &BTreeMap<SpaceId, SpaceId>,
    ) {
        match self {
            Self::CreateSpace { .. } => {}
            Self::CreateTask { seed } => remap_space(&mut seed.space, spaces),
            Self::CreateSubtask {
                seed,
                parent,
                placement,
            } => {
                remap_space(&mut seed.space, spaces);
                remap_task(parent, tasks);
                remap_placement(placement, tasks);
            }
            Self::UpdateTask { task, .. } | Self::Archive { task } | Self::Delete { task } => {
                remap_task(task, tasks);
            }
            Self::Reparent {
                task,
                new_parent,
                placement,
                to_space,
            } => {
                remap_task(task, tasks);
                if let Some(parent) = new_parent {
                    remap_task(parent, tasks);
                }
                remap_placement(placement, tasks);
                if let Some(space) = to_space {
                    remap_space(space, spaces);
                }
            }
            Self::Duplicate { roots } => {
                for root in roots {
                    remap_task(root, tasks);
                }
            }
            Self::ReorderTasks {
                space,
                task,
                placement,
            } => {
                remap_space(space, spaces);
                remap_task(task, tasks);
                remap_placement(placement, tasks);
            }
            Self::ReorderSubtasks {
                parent,
                task,
                placement,
            } => {
                remap_task(parent, tasks);
                remap_task(task, tasks);
                remap_placement(placement, tasks);
            }
            Self::MoveTask {
                task,
                from_space,
                to_space,
                placement,
            } => {
                remap_task(task, tasks);
                remap_space(from_space, spaces);
                remap_space(to_space, spaces);
                remap_placement(placement, tasks);
            }
            Self::MoveSubtask {
                task,
                from_parent,
                to_parent,
                placement,
            } => {
                remap_task(task, tasks);
                remap_task(from_parent, tasks);
                remap_task(to_parent, tasks);
                remap_placement(placement, tasks);
            }
        }
    }
}

fn remap_task(id: &mut TaskId, map: &BTreeMap<TaskId, TaskId>) {
    if let Some(mapped) = map.get(id) {
        *id = *mapped;
    }
}

fn remap_space(id: &mut SpaceId, map: &BTreeMap<SpaceId, SpaceId>) {
    if let Some(mapped) = map.get(id) {
        *id = *mapped;
    }
}

fn remap_placement(placement: &mut Placement, map: &BTreeMap<TaskId, TaskId>) {
    if let Placement::After { anchor } = placement {
        remap_task(anchor, map);
    }
}
