//! Tests for the archived-task retention sweep.

use crate::in_memory::helpers::{
    BoxError, archived_task, checked_snapshot, created_space, created_task, owner, runtime,
    seed_tasks, service_over, store, task_record,
};
use chrono::Utc;
use espalier::hierarchy::{
    adapters::memory::MemoryForestStore,
    domain::OwnerId,
    services::{ARCHIVE_GRACE_DAYS, NewTaskParams},
};
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// Tests that the sweep removes archives past the grace period and keeps
/// the rest.
#[rstest]
fn purge_removes_only_expired_archives(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let expired = archived_task(
        owner,
        "long gone",
        Utc::now() - chrono::Duration::days(ARCHIVE_GRACE_DAYS + 10),
    );
    let recent = archived_task(owner, "still resting", Utc::now() - chrono::Duration::days(5));
    let expired_id = expired.id;
    let recent_id = recent.id;
    seed_tasks(&rt, &store, vec![expired, recent])?;
    let service = service_over(&store);

    let purged = rt.block_on(service.purge_archived())?;

    assert_eq!(purged, 1);
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert!(snapshot.tasks.iter().all(|task| task.id != expired_id));
    assert!(task_record(&snapshot, recent_id)?.archived);
    Ok(())
}

/// Tests that a freshly archived task survives an immediate sweep.
#[rstest]
fn fresh_archives_survive_the_sweep(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let task_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "done for now")))?;
    let task = created_task(&task_outcome);
    rt.block_on(service.archive(owner, task))?;

    let purged = rt.block_on(service.purge_archived())?;

    assert_eq!(purged, 0);
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert!(task_record(&snapshot, task)?.archived);
    Ok(())
}
