//! Then steps for item lifecycle BDD scenarios.

use super::world::{ItemLifecycleWorld, item_id};
use itemkeeper::item::{
    domain::ItemState,
    ports::SpawnError,
    services::{ItemManagerError, ItemManagerResult},
};
use rstest_bdd_macros::then;

fn last_result(world: &ItemLifecycleWorld) -> Result<&ItemManagerResult<()>, eyre::Report> {
    world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no operation recorded in scenario world"))
}

fn check_item(
    world: &ItemLifecycleWorld,
    id: &str,
    state: &str,
    expect_pid: bool,
) -> Result<(), eyre::Report> {
    let expected_state = ItemState::try_from(state)
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let item = world.manager.get(&item_id(id)?)?;

    if item.state() != expected_state {
        return Err(eyre::eyre!(
            "expected state {expected_state}, found {}",
            item.state()
        ));
    }
    if item.pid().is_some() != expect_pid {
        return Err(eyre::eyre!("unexpected pid {:?} for {id}", item.pid()));
    }
    Ok(())
}

#[then(r#"the item "{id}" is "{state}" with a pid"#)]
fn item_has_pid(world: &ItemLifecycleWorld, id: String, state: String) -> Result<(), eyre::Report> {
    check_item(world, &id, &state, true)
}

#[then(r#"the item "{id}" is "{state}" without a pid"#)]
fn item_has_no_pid(
    world: &ItemLifecycleWorld,
    id: String,
    state: String,
) -> Result<(), eyre::Report> {
    check_item(world, &id, &state, false)
}

#[then("the operation fails with a missing binary error")]
fn fails_with_missing_binary(world: &ItemLifecycleWorld) -> Result<(), eyre::Report> {
    let result = last_result(world)?;
    if !matches!(
        result,
        Err(ItemManagerError::Spawn {
            source: SpawnError::BinaryMissing(_),
            ..
        })
    ) {
        return Err(eyre::eyre!("expected BinaryMissing, got {result:?}"));
    }
    Ok(())
}

#[then("the operation fails because the item is busy")]
fn fails_as_busy(world: &ItemLifecycleWorld) -> Result<(), eyre::Report> {
    let result = last_result(world)?;
    if !matches!(result, Err(ItemManagerError::Busy { .. })) {
        return Err(eyre::eyre!("expected Busy, got {result:?}"));
    }
    Ok(())
}

#[then("the operation fails with a lifecycle fault")]
fn fails_with_fault(world: &ItemLifecycleWorld) -> Result<(), eyre::Report> {
    let result = last_result(world)?;
    if !result.as_ref().is_err_and(ItemManagerError::is_fault) {
        return Err(eyre::eyre!("expected a lifecycle fault, got {result:?}"));
    }
    Ok(())
}

#[then(r#""{id}" received {count:usize} termination request"#)]
fn termination_requests(
    world: &ItemLifecycleWorld,
    id: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let calls = world.supervisor.terminate_calls(&item_id(&id)?);
    if calls != count {
        return Err(eyre::eyre!("expected {count} termination requests, got {calls}"));
    }
    Ok(())
}
