//! Subtree duplication.
//!
//! Duplication operates on a batch: the set of task ids to copy, always
//! loaded as complete subtrees. Only batch entry points — tasks whose
//! parent is absent or outside the batch — start a clone pass; everything
//! below an entry point is reached by recursing through `subtasks`, so a
//! parent and its child named in the same batch still produce exactly one
//! copy of the child.
//!
//! All id rewriting goes through one shared [`CloneIds`] map. References
//! between batch members (parent links, ancestor paths, sibling lists)
//! resolve to the freshly drawn ids; references leaving the batch keep the
//! original ids, which is how an entry point that is itself a subtask ends
//! up as a sibling of its original under the same parent.

use super::{HierarchyResult, OwnerId, Task, TaskForest, TaskId};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

/// Lazily allocated mapping from original task ids to their clone ids.
///
/// The first lookup of an original draws a fresh id; later lookups return
/// the same id, so every reference to one original resolves to one clone
/// no matter which part of the pass asks first.
#[derive(Debug, Clone, Default)]
pub struct CloneIds {
    mapping: BTreeMap<TaskId, TaskId>,
}

impl CloneIds {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the clone id for `original`, drawing a fresh one on first
    /// use.
    pub fn clone_of(&mut self, original: TaskId) -> TaskId {
        *self.mapping.entry(original).or_insert_with(TaskId::new)
    }

    /// Returns the clone id for `original` if one has been drawn.
    #[must_use]
    pub fn lookup(&self, original: TaskId) -> Option<TaskId> {
        self.mapping.get(&original).copied()
    }

    /// Rewrites `id` to its clone when `id` belongs to the batch, and keeps
    /// it unchanged when it does not.
    #[must_use]
    pub fn translate(&self, id: TaskId) -> TaskId {
        self.lookup(id).unwrap_or(id)
    }

    /// Every clone id drawn so far.
    #[must_use]
    pub fn clone_ids(&self) -> Vec<TaskId> {
        self.mapping.values().copied().collect()
    }

    /// Every original→clone pair drawn so far.
    #[must_use]
    pub fn pairs(&self) -> Vec<ClonePair> {
        self.mapping
            .iter()
            .map(|(original, clone)| ClonePair {
                original: *original,
                clone: *clone,
            })
            .collect()
    }

    /// Rewrites original ids through `map`, keeping the drawn clone ids.
    ///
    /// The mirror applies this when a provisional original resolves to its
    /// canonical id while a duplication of it is still pending, so the
    /// replay keeps handing out the same clone ids.
    pub(crate) fn rekey_originals(&mut self, map: &BTreeMap<TaskId, TaskId>) {
        if map.is_empty() {
            return;
        }
        self.mapping = self
            .mapping
            .iter()
            .map(|(original, clone)| (*map.get(original).unwrap_or(original), *clone))
            .collect();
    }
}

/// An original task id paired with the id of its copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClonePair {
    /// The task that was copied.
    pub original: TaskId,
    /// The freshly created copy.
    pub clone: TaskId,
}

/// Duplicates every subtree in `batch` inside the forest.
///
/// Clones carry the original content with positions nudged down-right and
/// lifted one stacking step, land immediately after their originals in the
/// containing ordering, and reference only ids drawn through `ids`. The
/// returned pairs cover each batch member exactly once.
///
/// A cycle among batch members (corrupt adjacency) cannot hang the pass:
/// a task already visited is never recursed into again.
///
/// # Errors
///
/// Returns [`TaskNotFound`](super::HierarchyError::TaskNotFound) or
/// [`Unauthorized`](super::HierarchyError::Unauthorized) when a batch member
/// is missing, archived, or foreign. Nothing is cloned on error.
pub fn duplicate_batch(
    forest: &mut TaskForest,
    actor: OwnerId,
    batch: &BTreeSet<TaskId>,
    ids: &mut CloneIds,
    clock: &impl Clock,
) -> HierarchyResult<Vec<ClonePair>> {
    let mut entries = Vec::new();
    for id in batch {
        let task = forest.require_owned_task(*id, actor)?;
        let is_entry = match task.parent_task {
            Some(parent) => !batch.contains(&parent),
            None => true,
        };
        if is_entry {
            entries.push(*id);
        }
    }

    let mut pairs = Vec::new();
    let mut visited = BTreeSet::new();
    for entry in entries {
        let clone = clone_subtree(forest, actor, entry, batch, ids, &mut visited, &mut pairs, clock);
        if let Some(clone_id) = clone {
            forest.link_clone_beside(entry, clone_id, clock);
        }
    }

    // Lifted clones may stack above the space's current high-water mark.
    for pair in &pairs {
        let placed = forest
            .task(pair.clone)
            .map(|clone| (clone.space, clone.position.z_index));
        if let Some((Some(space), z)) = placed {
            forest.raise_space_watermark(space, z, clock);
        }
    }
    Ok(pairs)
}

/// Clones `original` and, depth first, every batch member beneath it.
///
/// Returns `None` when the task was already visited or has vanished from
/// the forest mid-pass.
#[expect(
    clippy::too_many_arguments,
    reason = "single recursive worker sharing one pass's accumulators"
)]
fn clone_subtree(
    forest: &mut TaskForest,
    actor: OwnerId,
    original: TaskId,
    batch: &BTreeSet<TaskId>,
    ids: &mut CloneIds,
    visited: &mut BTreeSet<TaskId>,
    pairs: &mut Vec<ClonePair>,
    clock: &impl Clock,
) -> Option<TaskId> {
    if !visited.insert(original) {
        return ids.lookup(original);
    }
    let source = forest.task(original)?.clone();
    let clone_id = ids.clone_of(original);

    let mut cloned_children = Vec::new();
    for child in &source.subtasks {
        if !batch.contains(child) {
            continue;
        }
        if let Some(cloned) =
            clone_subtree(forest, actor, *child, batch, ids, visited, pairs, clock)
        {
            cloned_children.push(cloned);
        }
    }

    let now = clock.utc();
    let clone = Task {
        id: clone_id,
        owner: actor,
        name: source.name,
        description: source.description,
        progress: source.progress,
        position: source.position.duplicate_offset(),
        size: source.size,
        space: source.space,
        parent_task: source.parent_task.map(|parent| ids.translate(parent)),
        subtasks: cloned_children,
        ancestors: source
            .ancestors
            .iter()
            .map(|ancestor| ids.translate(*ancestor))
            .collect(),
        archived: false,
        archived_at: None,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    forest.add_clone(clone);
    pairs.push(ClonePair {
        original,
        clone: clone_id,
    });
    Some(clone_id)
}
