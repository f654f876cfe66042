//! When steps for hierarchy operation BDD scenarios.

use super::world::{HierarchyWorld, run_async};
use espalier::hierarchy::domain::Placement;
use rstest_bdd_macros::when;

#[when(r#""{task}" is reparented beneath "{parent}""#)]
fn reparent_beneath(
    world: &mut HierarchyWorld,
    task: String,
    parent: String,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&task)?;
    let parent_id = world.task_id(&parent)?;
    let result = run_async(world.service.reparent(
        world.owner,
        task_id,
        Some(parent_id),
        Placement::End,
        None,
    ));
    world.last_failure = result.err();
    Ok(())
}

#[when(r#""{task}" is archived"#)]
fn archive_task(world: &mut HierarchyWorld, task: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&task)?;
    let result = run_async(world.service.archive(world.owner, task_id));
    world.last_failure = result.err();
    Ok(())
}
