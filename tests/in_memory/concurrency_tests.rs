//! Write-contention tests over the in-memory store.
//!
//! These interleave a rival commit into an operation's write path to prove
//! the retry loop replans against fresh state rather than corrupting or
//! silently dropping either edit.

use crate::in_memory::helpers::{
    BoxError, RacingStore, RivalReorder, StubbornStore, checked_snapshot, created_space,
    created_task, owner, runtime, service_over, store, task_record,
};
use espalier::hierarchy::{
    adapters::memory::MemoryForestStore,
    domain::{HierarchyError, OwnerId, Placement},
    ports::ForestStore,
    services::{HierarchyService, NewSubtaskParams, NewTaskParams, RetryPolicy},
};
use mockable::DefaultClock;
use rstest::rstest;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

/// Tests that a reorder losing the write race replans against the rival's
/// committed order instead of clobbering it.
#[rstest]
fn racing_reorders_converge_without_corruption(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let setup = service_over(&store);
    let space_outcome = rt.block_on(setup.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let parent_outcome =
        rt.block_on(setup.create_task(owner, NewTaskParams::new(space, "parent")))?;
    let parent = created_task(&parent_outcome);
    let mut children = Vec::new();
    for name in ["a", "b", "c"] {
        let child_outcome = rt.block_on(setup.create_subtask(
            owner,
            NewSubtaskParams::new(parent, Placement::End, name),
        ))?;
        children.push(created_task(&child_outcome));
    }
    let [a, b, c] = children.as_slice() else {
        return Err("expected three children".into());
    };

    // The rival lands `c` after `a` in the middle of our commit, so our
    // first attempt was planned on [a, b, c] while the store holds
    // [a, c, b] by the time we write.
    let racing = RacingStore::new(
        store.clone(),
        RivalReorder {
            owner,
            parent,
            task: *c,
            placement: Placement::after(*a),
        },
    );
    let contended = HierarchyService::new(Arc::new(racing), Arc::new(DefaultClock))
        .with_policies(fast_policy(), fast_policy());

    rt.block_on(contended.reorder_subtasks(owner, parent, *b, Placement::Start))?;

    let snapshot = checked_snapshot(&rt, &setup, owner)?;
    let parent_record = task_record(&snapshot, parent)?;
    // Our move to the front replays on top of the rival's order.
    assert_eq!(parent_record.subtasks, vec![*b, *a, *c]);
    let members: BTreeSet<_> = parent_record.subtasks.iter().copied().collect();
    assert_eq!(members, children.iter().copied().collect());
    Ok(())
}

/// Tests that a store which never stops conflicting exhausts the retry
/// budget and surfaces a conflict, leaving the backing state untouched.
#[rstest]
fn exhausted_retries_surface_a_conflict(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stubborn = StubbornStore::new(store.clone());
    let service = HierarchyService::new(Arc::new(stubborn), Arc::new(DefaultClock))
        .with_policies(fast_policy(), fast_policy());

    let refusal = rt.block_on(service.create_space(owner, "Doomed", "grey"));

    let Err(error) = refusal else {
        return Err("expected the commit to conflict".into());
    };
    assert!(matches!(error, HierarchyError::Conflict(_)));
    assert_eq!(error.kind(), "conflict");
    let spaces = rt.block_on(store.spaces_for_owner(owner))?;
    assert!(spaces.is_empty());
    Ok(())
}

/// Tests that a caller whose view of a subtask's parent is stale gets a
/// conflict: fresh reads keep disagreeing with the declaration, so no
/// amount of retrying can make the move apply.
#[rstest]
fn stale_container_declarations_conflict_after_retries(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let setup = service_over(&store);
    let space_outcome = rt.block_on(setup.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let first_outcome =
        rt.block_on(setup.create_task(owner, NewTaskParams::new(space, "actual parent")))?;
    let actual_parent = created_task(&first_outcome);
    let second_outcome =
        rt.block_on(setup.create_task(owner, NewTaskParams::new(space, "claimed parent")))?;
    let claimed_parent = created_task(&second_outcome);
    let child_outcome = rt.block_on(setup.create_subtask(
        owner,
        NewSubtaskParams::new(actual_parent, Placement::End, "child"),
    ))?;
    let child = created_task(&child_outcome);
    let service = service_over(&store).with_policies(fast_policy(), fast_policy());

    let refusal = rt.block_on(service.move_subtask(
        owner,
        child,
        claimed_parent,
        actual_parent,
        Placement::End,
    ));

    assert!(matches!(refusal, Err(HierarchyError::Conflict(_))));
    let snapshot = checked_snapshot(&rt, &setup, owner)?;
    let child_record = task_record(&snapshot, child)?;
    assert_eq!(child_record.parent_task, Some(actual_parent));
    Ok(())
}
