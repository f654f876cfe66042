//! Application services for hierarchy orchestration.

mod coordinator;
mod engine;

pub use coordinator::RetryPolicy;
pub use engine::{
    ARCHIVE_GRACE_DAYS, ChangeSet, CommittedMutation, HierarchyService, NewSubtaskParams,
    NewTaskParams, Snapshot,
};
