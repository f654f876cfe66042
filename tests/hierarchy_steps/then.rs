//! Then steps for hierarchy operation BDD scenarios.

use super::world::{HierarchyWorld, run_async};
use espalier::hierarchy::domain::{HierarchyError, Task};
use eyre::WrapErr;
use rstest_bdd_macros::then;

fn find_task(world: &HierarchyWorld, name: &str) -> Result<Task, eyre::Report> {
    let id = world.task_id(name)?;
    let snapshot = run_async(world.service.snapshot(world.owner))
        .wrap_err("fetch snapshot for assertions")?;
    snapshot
        .tasks
        .into_iter()
        .find(|task| task.id == id)
        .ok_or_else(|| eyre::eyre!("task {name:?} missing from snapshot"))
}

#[then(r#""{child}" is a subtask of "{parent}""#)]
fn is_subtask_of(
    world: &HierarchyWorld,
    child: String,
    parent: String,
) -> Result<(), eyre::Report> {
    let parent_id = world.task_id(&parent)?;
    let child_task = find_task(world, &child)?;
    let parent_task = find_task(world, &parent)?;

    if child_task.parent_task != Some(parent_id) {
        return Err(eyre::eyre!(
            "expected {child:?} to have parent {parent:?}, found {:?}",
            child_task.parent_task
        ));
    }
    if child_task.ancestors != vec![parent_id] {
        return Err(eyre::eyre!(
            "expected {child:?} ancestors to be [{parent:?}], found {:?}",
            child_task.ancestors
        ));
    }
    if !parent_task.subtasks.contains(&child_task.id) {
        return Err(eyre::eyre!(
            "expected {parent:?} subtasks to contain {child:?}"
        ));
    }
    Ok(())
}

#[then("the operation fails with a depth violation")]
fn fails_with_depth_violation(world: &HierarchyWorld) -> Result<(), eyre::Report> {
    match &world.last_failure {
        Some(HierarchyError::DepthViolation(_)) => Ok(()),
        other => Err(eyre::eyre!("expected a depth violation, got {other:?}")),
    }
}

#[then("the operation fails with a business rule violation")]
fn fails_with_business_rule_violation(world: &HierarchyWorld) -> Result<(), eyre::Report> {
    match &world.last_failure {
        Some(HierarchyError::BusinessRule(_)) => Ok(()),
        other => Err(eyre::eyre!(
            "expected a business rule violation, got {other:?}"
        )),
    }
}

#[then(r#""{name}" is archived with no structural links"#)]
fn archived_with_no_links(world: &HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let task = find_task(world, &name)?;
    if !task.archived || task.archived_at.is_none() {
        return Err(eyre::eyre!("expected {name:?} to be archived"));
    }
    if task.space.is_some()
        || task.parent_task.is_some()
        || !task.subtasks.is_empty()
        || !task.ancestors.is_empty()
    {
        return Err(eyre::eyre!(
            "expected {name:?} to carry no structural links, found {task:?}"
        ));
    }
    Ok(())
}

#[then(r#""{name}" is not archived"#)]
fn not_archived(world: &HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let task = find_task(world, &name)?;
    if task.archived {
        return Err(eyre::eyre!("expected {name:?} to remain live"));
    }
    Ok(())
}

#[then(r#""{name}" is absent from the space's task order"#)]
fn absent_from_task_order(world: &HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let id = world.task_id(&name)?;
    let space_id = world
        .space
        .ok_or_else(|| eyre::eyre!("missing space in scenario world"))?;
    let snapshot = run_async(world.service.snapshot(world.owner))
        .wrap_err("fetch snapshot for assertions")?;
    let space = snapshot
        .spaces
        .iter()
        .find(|candidate| candidate.id == space_id)
        .ok_or_else(|| eyre::eyre!("space missing from snapshot"))?;
    if space.task_order.contains(&id) {
        return Err(eyre::eyre!(
            "expected task order to no longer list {name:?}, found {:?}",
            space.task_order
        ));
    }
    Ok(())
}
