//! Domain model for the task hierarchy.
//!
//! The hierarchy domain models bounded-depth parent/child task trees grouped
//! into ordered spaces, and every structural mutation over them: creation,
//! content patches, reparenting, cascading archive and delete, subtree
//! duplication, and sibling reordering. All rules live here, behind pure
//! in-memory operations on a loaded [`TaskForest`], keeping persistence and
//! transport concerns outside the domain boundary.

mod duplicate;
mod error;
mod forest;
mod geometry;
mod ids;
mod intent;
pub(crate) mod placement;
mod progress;
mod space;
mod task;

pub use duplicate::{CloneIds, ClonePair};
pub use error::{HierarchyError, HierarchyResult, ParseProgressError};
pub use forest::{ConsistencyViolation, ForestChanges, NESTING_LIMIT, TaskForest};
pub use geometry::{BoardExtent, BoardPosition, DUPLICATE_NUDGE, DUPLICATE_Z_LIFT};
pub use ids::{OwnerId, SpaceId, TaskId};
pub use intent::{IntentEffect, MutationIntent};
pub use placement::Placement;
pub use progress::Progress;
pub use space::Space;
pub use task::{Task, TaskPatch, TaskSeed};

pub(crate) use duplicate::duplicate_batch;
