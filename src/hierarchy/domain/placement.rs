//! Sibling-order maintenance for spaces and parents.
//!
//! Two independent orderings exist in the hierarchy: a space's `task_order`
//! over its root tasks and a parent's `subtasks` over its children. Both are
//! explicit ordered sequences, independent of creation time, and both are
//! edited exclusively through the primitives here so that membership stays
//! duplicate-free and reorders remain pure permutations.

use super::TaskId;
use serde::{Deserialize, Serialize};

/// Target position within a sibling ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Placement {
    /// Before every current sibling.
    Start,
    /// After every current sibling.
    End,
    /// Immediately after the named sibling; when the anchor is absent from
    /// the ordering, the id is appended at the end instead.
    After {
        /// The sibling to land behind.
        anchor: TaskId,
    },
}

impl Placement {
    /// Convenience constructor for [`Placement::After`].
    #[must_use]
    pub const fn after(anchor: TaskId) -> Self {
        Self::After { anchor }
    }
}

/// Inserts `id` into `order` at the requested placement.
///
/// Any existing occurrence of `id` is removed first, so the primitive is
/// idempotent and can never introduce a duplicate.
pub fn insert(order: &mut Vec<TaskId>, id: TaskId, placement: Placement) {
    remove(order, id);
    match placement {
        Placement::Start => order.insert(0, id),
        Placement::End => order.push(id),
        Placement::After { anchor } => {
            let index = order.iter().position(|member| *member == anchor);
            match index {
                Some(found) => order.insert(found.saturating_add(1), id),
                None => order.push(id),
            }
        }
    }
}

/// Removes `id` from `order` and reports whether it was present.
pub fn remove(order: &mut Vec<TaskId>, id: TaskId) -> bool {
    let before = order.len();
    order.retain(|member| *member != id);
    before != order.len()
}

/// Moves `id` to the requested placement within `order`.
///
/// This is a pure permutation: the set of members is unchanged, only the
/// sequence moves. Returns `false` (leaving the order untouched) when `id`
/// is not currently a member.
pub fn resequence(order: &mut Vec<TaskId>, id: TaskId, placement: Placement) -> bool {
    if !order.contains(&id) {
        return false;
    }
    insert(order, id, placement);
    true
}
