//! End-to-end operation tests over the in-memory store.
//!
//! Every test drives the public service API and re-verifies the full
//! committed account state after mutating.

use crate::in_memory::helpers::{
    BoxError, checked_snapshot, created_space, created_task, owner, runtime, service_over, store,
    task_record,
};
use espalier::hierarchy::{
    adapters::memory::MemoryForestStore,
    domain::{
        HierarchyError, IntentEffect, NESTING_LIMIT, OwnerId, Placement, Progress, TaskPatch,
    },
    services::{NewSubtaskParams, NewTaskParams},
};
use rstest::rstest;
use std::collections::BTreeSet;
use std::io;
use tokio::runtime::Runtime;

fn complete() -> TaskPatch {
    TaskPatch {
        progress: Some(Progress::Complete),
        ..TaskPatch::default()
    }
}

/// Tests that committed state never exceeds the two-level bound.
#[rstest]
fn nesting_stops_at_subtasks(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let root_outcome = rt.block_on(service.create_task(owner, NewTaskParams::new(space, "root")))?;
    let root = created_task(&root_outcome);
    let child_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(root, Placement::End, "child"),
    ))?;
    let child = created_task(&child_outcome);

    let too_deep = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(child, Placement::End, "too deep"),
    ));
    assert!(matches!(too_deep, Err(HierarchyError::DepthViolation(_))));

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert!(
        snapshot
            .tasks
            .iter()
            .all(|task| task.ancestors.len() <= NESTING_LIMIT)
    );
    Ok(())
}

/// Tests that attaching and detaching rewrite the ancestor chain.
#[rstest]
fn reparenting_rewrites_the_ancestor_chain(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let first_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "first parent")))?;
    let first = created_task(&first_outcome);
    let second_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "second parent")))?;
    let second = created_task(&second_outcome);
    let child_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(first, Placement::End, "child"),
    ))?;
    let child = created_task(&child_outcome);

    rt.block_on(service.reparent(owner, child, Some(second), Placement::End, None))?;
    let attached = checked_snapshot(&rt, &service, owner)?;
    let moved = task_record(&attached, child)?;
    assert_eq!(moved.parent_task, Some(second));
    assert_eq!(moved.ancestors, vec![second]);
    assert!(task_record(&attached, first)?.subtasks.is_empty());
    assert_eq!(task_record(&attached, second)?.subtasks, vec![child]);

    rt.block_on(service.reparent(owner, child, None, Placement::Start, None))?;
    let detached = checked_snapshot(&rt, &service, owner)?;
    let freed = task_record(&detached, child)?;
    assert!(freed.is_root());
    assert!(freed.ancestors.is_empty());
    let space_record = detached.spaces.first().ok_or("space missing from snapshot")?;
    // Detached tasks land at the front of the space order.
    assert_eq!(space_record.task_order.first(), Some(&child));
    Ok(())
}

/// Tests the nesting acceptance rules: leaf subtasks move freely, tasks
/// with children never become subtasks.
#[rstest]
fn nesting_accepts_leaves_and_rejects_parents(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let host_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "host")))?;
    let host = created_task(&host_outcome);
    let target_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "target")))?;
    let target = created_task(&target_outcome);
    let leaf_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(host, Placement::End, "leaf"),
    ))?;
    let leaf = created_task(&leaf_outcome);
    let parent_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "busy parent")))?;
    let busy_parent = created_task(&parent_outcome);
    rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(busy_parent, Placement::End, "occupant"),
    ))?;

    // A childless subtask is accepted beneath another root.
    rt.block_on(service.reparent(owner, leaf, Some(target), Placement::End, None))?;
    // A task that already has children is not.
    let refusal = rt.block_on(service.reparent(
        owner,
        busy_parent,
        Some(target),
        Placement::End,
        None,
    ));
    assert!(matches!(refusal, Err(HierarchyError::DepthViolation(_))));

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert_eq!(task_record(&snapshot, leaf)?.ancestors, vec![target]);
    assert!(task_record(&snapshot, busy_parent)?.is_root());
    Ok(())
}

/// Tests the archive cascade: every record severed, the order cleaned.
#[rstest]
fn archiving_severs_the_whole_subtree(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let parent_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "parent")))?;
    let parent = created_task(&parent_outcome);
    let first_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(parent, Placement::End, "first step"),
    ))?;
    let first = created_task(&first_outcome);
    let second_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(parent, Placement::End, "second step"),
    ))?;
    let second = created_task(&second_outcome);
    rt.block_on(service.update_task(owner, first, complete()))?;
    rt.block_on(service.update_task(owner, second, complete()))?;

    let outcome = rt.block_on(service.archive(owner, parent))?;

    let IntentEffect::Archived { tasks } = outcome.effect else {
        return Err("expected an archive effect".into());
    };
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks.first(), Some(&parent));
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    for id in [parent, first, second] {
        let record = task_record(&snapshot, id)?;
        assert!(record.archived);
        assert!(record.parent_task.is_none());
        assert!(record.ancestors.is_empty());
        assert!(record.space.is_none());
        assert!(record.archived_at.is_some());
    }
    let space_record = snapshot.spaces.first().ok_or("space missing from snapshot")?;
    assert!(!space_record.task_order.contains(&parent));
    Ok(())
}

/// Tests that archiving is refused while any descendant is unfinished.
#[rstest]
fn archiving_requires_finished_descendants(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let parent_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "parent")))?;
    let parent = created_task(&parent_outcome);
    rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(parent, Placement::End, "unfinished"),
    ))?;

    let refusal = rt.block_on(service.archive(owner, parent));

    assert!(matches!(refusal, Err(HierarchyError::BusinessRule(_))));
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert!(!task_record(&snapshot, parent)?.archived);
    Ok(())
}

/// Tests that deletion erases the subtree and every reference to it.
#[rstest]
fn deleting_erases_the_subtree_and_its_references(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let bystander_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "bystander")))?;
    let bystander = created_task(&bystander_outcome);
    let parent_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "doomed")))?;
    let parent = created_task(&parent_outcome);
    let first_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(parent, Placement::End, "first step"),
    ))?;
    let first = created_task(&first_outcome);
    let second_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(parent, Placement::End, "second step"),
    ))?;
    let second = created_task(&second_outcome);

    let outcome = rt.block_on(service.delete(owner, parent))?;

    let IntentEffect::Deleted { tasks } = outcome.effect else {
        return Err("expected a delete effect".into());
    };
    assert_eq!(tasks.len(), 3);
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert_eq!(snapshot.tasks.len(), 1);
    let erased = [parent, first, second];
    for survivor in &snapshot.tasks {
        assert!(
            survivor
                .parent_task
                .is_none_or(|parent_id| !erased.contains(&parent_id))
        );
        assert!(survivor.ancestors.iter().all(|id| !erased.contains(id)));
        assert!(survivor.subtasks.iter().all(|id| !erased.contains(id)));
    }
    let space_record = snapshot.spaces.first().ok_or("space missing from snapshot")?;
    assert_eq!(space_record.task_order, vec![bystander]);
    Ok(())
}

/// Tests the root reorder: siblings `[a, b, c]`, move `c` to `after:a`,
/// expect `[a, c, b]` with the same member set.
#[rstest]
fn reordering_roots_is_a_pure_permutation(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    // Creation prepends, so create in reverse of the order we want.
    let c = created_task(&rt.block_on(service.create_task(owner, NewTaskParams::new(space, "gamma")))?);
    let b = created_task(&rt.block_on(service.create_task(owner, NewTaskParams::new(space, "beta")))?);
    let a = created_task(&rt.block_on(service.create_task(owner, NewTaskParams::new(space, "alpha")))?);

    let outcome = rt.block_on(service.reorder_tasks(owner, space, c, Placement::after(a)))?;

    assert_eq!(outcome.effect, IntentEffect::Reordered);
    let snapshot = checked_snapshot(&rt, &service, owner)?;
    let space_record = snapshot.spaces.first().ok_or("space missing from snapshot")?;
    assert_eq!(space_record.task_order, vec![a, c, b]);
    Ok(())
}

/// Tests that subtask reorders permute the child list without loss.
#[rstest]
fn reordering_subtasks_is_a_pure_permutation(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let parent_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "parent")))?;
    let parent = created_task(&parent_outcome);
    let mut children = Vec::new();
    for name in ["one", "two", "three"] {
        let child_outcome = rt.block_on(service.create_subtask(
            owner,
            NewSubtaskParams::new(parent, Placement::End, name),
        ))?;
        children.push(created_task(&child_outcome));
    }
    let [one, two, three] = children.as_slice() else {
        return Err("expected three children".into());
    };

    rt.block_on(service.reorder_subtasks(owner, parent, *three, Placement::after(*one)))?;

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    let parent_record = task_record(&snapshot, parent)?;
    assert_eq!(parent_record.subtasks, vec![*one, *three, *two]);
    Ok(())
}

/// Tests that duplication copies the subtree shape using only fresh ids.
#[rstest]
fn duplication_is_shape_preserving(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let root_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "root")))?;
    let root = created_task(&root_outcome);
    let first_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(root, Placement::End, "first"),
    ))?;
    let first = created_task(&first_outcome);
    let second_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(root, Placement::End, "second"),
    ))?;
    let second = created_task(&second_outcome);

    let outcome = rt.block_on(service.duplicate(owner, vec![root]))?;

    let pairs = &outcome.changes.clone_pairs;
    assert_eq!(pairs.len(), 3);
    let originals: BTreeSet<_> = pairs.iter().map(|pair| pair.original).collect();
    let clones: BTreeSet<_> = pairs.iter().map(|pair| pair.clone).collect();
    assert!(originals.is_disjoint(&clones));

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    let clone_of = |id| {
        pairs
            .iter()
            .find(|pair| pair.original == id)
            .map(|pair| pair.clone)
            .ok_or_else(|| BoxError::from(format!("no clone recorded for {id}")))
    };
    let root_clone = clone_of(root)?;
    let clone_record = task_record(&snapshot, root_clone)?;
    // Same relative child order, every reference inside the copied batch.
    assert_eq!(clone_record.subtasks, vec![clone_of(first)?, clone_of(second)?]);
    for child_clone in &clone_record.subtasks {
        let child_record = task_record(&snapshot, *child_clone)?;
        assert_eq!(child_record.parent_task, Some(root_clone));
        assert_eq!(child_record.ancestors, vec![root_clone]);
    }
    let space_record = snapshot.spaces.first().ok_or("space missing from snapshot")?;
    assert_eq!(space_record.task_order, vec![root, root_clone]);
    Ok(())
}

/// Tests that moving a root between spaces re-homes its whole subtree.
#[rstest]
fn moving_a_root_re_homes_its_descendants(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let source_outcome = rt.block_on(service.create_space(owner, "Source", "teal"))?;
    let source = created_space(&source_outcome);
    let dest_outcome = rt.block_on(service.create_space(owner, "Destination", "plum"))?;
    let dest = created_space(&dest_outcome);
    let root_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(source, "mover")))?;
    let root = created_task(&root_outcome);
    let child_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(root, Placement::End, "cargo"),
    ))?;
    let child = created_task(&child_outcome);

    rt.block_on(service.move_task(owner, root, source, dest, Placement::End))?;

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    assert_eq!(task_record(&snapshot, root)?.space, Some(dest));
    let carried = task_record(&snapshot, child)?;
    assert_eq!(carried.space, Some(dest));
    assert_eq!(carried.ancestors, vec![root]);
    let find_space = |id| {
        snapshot
            .spaces
            .iter()
            .find(|record| record.id == id)
            .ok_or_else(|| BoxError::from(format!("space {id} missing from snapshot")))
    };
    assert!(find_space(source)?.task_order.is_empty());
    assert_eq!(find_space(dest)?.task_order, vec![root]);
    Ok(())
}

/// Tests that moving a subtask between parents rewrites both child lists.
#[rstest]
fn moving_a_subtask_swaps_parents(
    runtime: io::Result<Runtime>,
    store: MemoryForestStore,
    owner: OwnerId,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let service = service_over(&store);
    let space_outcome = rt.block_on(service.create_space(owner, "Plans", "teal"))?;
    let space = created_space(&space_outcome);
    let old_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "old parent")))?;
    let old_parent = created_task(&old_outcome);
    let new_outcome =
        rt.block_on(service.create_task(owner, NewTaskParams::new(space, "new parent")))?;
    let new_parent = created_task(&new_outcome);
    let child_outcome = rt.block_on(service.create_subtask(
        owner,
        NewSubtaskParams::new(old_parent, Placement::End, "child"),
    ))?;
    let child = created_task(&child_outcome);

    rt.block_on(service.move_subtask(owner, child, old_parent, new_parent, Placement::End))?;

    let snapshot = checked_snapshot(&rt, &service, owner)?;
    let moved = task_record(&snapshot, child)?;
    assert_eq!(moved.parent_task, Some(new_parent));
    assert_eq!(moved.ancestors, vec![new_parent]);
    assert!(task_record(&snapshot, old_parent)?.subtasks.is_empty());
    assert_eq!(task_record(&snapshot, new_parent)?.subtasks, vec![child]);
    Ok(())
}
