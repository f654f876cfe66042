//! Given steps for hierarchy operation BDD scenarios.

use super::world::{HierarchyWorld, run_async};
use espalier::hierarchy::{
    domain::{IntentEffect, Placement, Progress, TaskId, TaskPatch},
    services::{CommittedMutation, NewSubtaskParams, NewTaskParams},
};
use eyre::WrapErr;
use rstest_bdd_macros::given;

fn created_task_id(outcome: &CommittedMutation) -> Result<TaskId, eyre::Report> {
    match &outcome.effect {
        IntentEffect::TaskCreated { task } => Ok(*task),
        other => Err(eyre::eyre!("expected a created task, got {other:?}")),
    }
}

#[given(r#"a space named "{name}""#)]
fn space_named(world: &mut HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let outcome = run_async(world.service.create_space(world.owner, name, "teal"))
        .wrap_err("create space in scenario setup")?;
    let IntentEffect::SpaceCreated { space } = outcome.effect else {
        return Err(eyre::eyre!("expected a created space"));
    };
    world.space = Some(space);
    Ok(())
}

#[given(r#"a root task named "{name}""#)]
fn root_task_named(world: &mut HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let space = world
        .space
        .ok_or_else(|| eyre::eyre!("missing space in scenario world"))?;
    let outcome = run_async(
        world
            .service
            .create_task(world.owner, NewTaskParams::new(space, name.clone())),
    )
    .wrap_err("create root task in scenario setup")?;
    world.tasks.insert(name, created_task_id(&outcome)?);
    Ok(())
}

#[given(r#"a subtask of "{parent}" named "{name}""#)]
fn subtask_named(
    world: &mut HierarchyWorld,
    parent: String,
    name: String,
) -> Result<(), eyre::Report> {
    let parent_id = world.task_id(&parent)?;
    let outcome = run_async(world.service.create_subtask(
        world.owner,
        NewSubtaskParams::new(parent_id, Placement::End, name.clone()),
    ))
    .wrap_err("create subtask in scenario setup")?;
    world.tasks.insert(name, created_task_id(&outcome)?);
    Ok(())
}

#[given(r#"the task "{name}" is complete"#)]
fn task_is_complete(world: &mut HierarchyWorld, name: String) -> Result<(), eyre::Report> {
    let task = world.task_id(&name)?;
    let patch = TaskPatch {
        progress: Some(Progress::Complete),
        ..TaskPatch::default()
    };
    run_async(world.service.update_task(world.owner, task, patch))
        .wrap_err("mark task complete in scenario setup")?;
    Ok(())
}
