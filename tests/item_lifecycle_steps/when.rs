//! When steps for item lifecycle BDD scenarios.

use super::world::{ItemLifecycleWorld, item_id, run_async};
use rstest_bdd_macros::when;

#[when(r#"the item "{id}" is started"#)]
fn start_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    let result = run_async(world.manager.start(&item_id(&id)?));
    world.last_result = Some(result.map(drop));
    Ok(())
}

#[when(r#"the item "{id}" is stopped"#)]
fn stop_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    let result = run_async(world.manager.stop(&item_id(&id)?));
    world.last_result = Some(result.map(drop));
    Ok(())
}

#[when(r#"the item "{id}" is refreshed"#)]
fn refresh_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    let result = run_async(world.manager.refresh(&item_id(&id)?));
    world.last_result = Some(result.map(drop));
    Ok(())
}

#[when(r#"the item "{id}" is reset"#)]
fn reset_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    let result = run_async(world.manager.reset(&item_id(&id)?));
    world.last_result = Some(result.map(drop));
    Ok(())
}

#[when(r#"the item "{id}" is deleted"#)]
fn delete_item(world: &mut ItemLifecycleWorld, id: String) -> Result<(), eyre::Report> {
    let result = run_async(world.manager.delete(&item_id(&id)?));
    world.last_result = Some(result);
    Ok(())
}
