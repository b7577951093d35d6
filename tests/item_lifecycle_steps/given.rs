//! Given steps for item lifecycle BDD scenarios.

use super::world::{ItemLifecycleWorld, SCENARIO_BINARY, item_id, run_async, runnable_item};
use eyre::WrapErr;
use itemkeeper::item::domain::ProcessStatus;
use rstest_bdd_macros::given;

fn create_runnable(world: &ItemLifecycleWorld, id: &str) -> Result<(), eyre::Report> {
    run_async(world.manager.create(runnable_item(id)?)).wrap_err("create scenario item")?;
    Ok(())
}

#[given(r#"a stored item "{id}" with a launch command"#)]
fn stored_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    create_runnable(world, &id)
}

#[given(r#"a stored item "{id}" whose binary is missing"#)]
fn stored_item_with_missing_binary(
    world: &mut ItemLifecycleWorld,
    id: String,
) -> Result<(), eyre::Report> {
    world.supervisor.mark_missing(SCENARIO_BINARY);
    create_runnable(world, &id)
}

#[given(r#"a running item "{id}""#)]
fn running_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    create_runnable(world, &id)?;
    run_async(world.manager.start(&item_id(&id)?)).wrap_err("start scenario item")?;
    Ok(())
}

#[given(r#"the process of "{id}" exits with code {code:i32}"#)]
fn process_exits(
    world: &mut ItemLifecycleWorld,
    id: String,
    code: i32,
) -> Result<(), eyre::Report> {
    if !world
        .supervisor
        .finish(&item_id(&id)?, ProcessStatus::Exited(code))
    {
        return Err(eyre::eyre!("no process tracked for {id}"));
    }
    Ok(())
}
