//! End-to-end lifecycle tests over the filesystem store and OS processes.
#![cfg(unix)]

use eyre::{ensure, eyre};
use itemkeeper::item::{
    domain::{ItemId, ItemState, LaunchCommand, NewItem, ProcessStatus},
    services::{ItemManagerConfig, ItemManagerError, ProductionItemManager},
};
use rstest::{fixture, rstest};
use std::time::Duration;
use tempfile::TempDir;

struct Deployment {
    _root: TempDir,
    manager: ProductionItemManager,
}

#[fixture]
fn deployment() -> Deployment {
    let root = TempDir::new().expect("create storage root");
    let config = ItemManagerConfig::new(root.path())
        .expect("absolute root")
        .with_grace_period(Duration::from_millis(500));
    let manager = ProductionItemManager::from_config(&config);
    Deployment {
        _root: root,
        manager,
    }
}

fn id(raw: &str) -> ItemId {
    ItemId::new(raw).expect("valid id")
}

fn shell_item(raw: &str, script: &str) -> NewItem {
    let command = LaunchCommand::new("/bin/sh")
        .expect("valid command")
        .with_args(["-c", script]);
    NewItem::new(id(raw), "Demo", "1.0.0").with_command(command)
}

/// Refreshes until the item leaves `expected_from` or the attempts run out.
async fn refresh_until_settled(
    manager: &ProductionItemManager,
    item: &ItemId,
    expected_from: ItemState,
) -> eyre::Result<ProcessStatus> {
    for _ in 0..100 {
        let report = manager.refresh(item).await?;
        if report.item.state() != expected_from {
            return Ok(report.status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(eyre!("item {item} never left {expected_from}"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clean_exit_returns_item_to_stopped(deployment: Deployment) -> eyre::Result<()> {
    let manager = &deployment.manager;
    let svc1 = id("svc1");

    let created = manager.create(shell_item("svc1", "sleep 0.2")).await?;
    ensure!(created.state() == ItemState::Stopped);

    let started = manager.start(&svc1).await?;
    ensure!(started.state() == ItemState::Running);
    ensure!(started.pid().is_some());

    let status = refresh_until_settled(manager, &svc1, ItemState::Running).await?;
    ensure!(status == ProcessStatus::Exited(0), "got {status}");
    let settled = manager.get(&svc1)?;
    ensure!(settled.state() == ItemState::Stopped);
    ensure!(settled.pid().is_none());

    let restarted = manager.start(&svc1).await?;
    ensure!(restarted.state() == ItemState::Running);
    manager.stop(&svc1).await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn crash_fails_the_item_until_reset(deployment: Deployment) -> eyre::Result<()> {
    let manager = &deployment.manager;
    let svc1 = id("svc1");
    manager.create(shell_item("svc1", "exit 3")).await?;
    manager.start(&svc1).await?;

    let status = refresh_until_settled(manager, &svc1, ItemState::Running).await?;

    ensure!(status == ProcessStatus::Exited(3), "got {status}");
    ensure!(manager.get(&svc1)?.state() == ItemState::Failed);
    ensure!(manager.reset(&svc1).await?.state() == ItemState::Stopped);
    manager.delete(&svc1).await?;
    ensure!(manager.list()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_persists_stopped_and_is_idempotent(deployment: Deployment) -> eyre::Result<()> {
    let manager = &deployment.manager;
    let svc1 = id("svc1");
    manager.create(shell_item("svc1", "exec sleep 30")).await?;
    manager.start(&svc1).await?;

    let stopped = manager.stop(&svc1).await?;
    let again = manager.stop(&svc1).await?;

    ensure!(stopped.state() == ItemState::Stopped);
    ensure!(again == stopped);
    ensure!(manager.get(&svc1)? == stopped);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_stop_is_completed_by_refresh(deployment: Deployment) -> eyre::Result<()> {
    let manager = deployment
        .manager
        .clone()
        .with_grace_period(Duration::from_secs(30));
    let svc1 = id("svc1");
    manager
        .create(shell_item("svc1", "trap '' TERM; while true; do sleep 1; done"))
        .await?;
    manager.start(&svc1).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let cancelled = tokio::time::timeout(Duration::from_millis(200), manager.stop(&svc1)).await;
    ensure!(cancelled.is_err(), "stop should have been cancelled");
    ensure!(manager.get(&svc1)?.state() == ItemState::Stopping);

    let status = refresh_until_settled(&manager, &svc1, ItemState::Stopping).await?;

    ensure!(status == ProcessStatus::Signaled(9), "got {status}");
    let settled = manager.get(&svc1)?;
    ensure!(settled.state() == ItemState::Stopped);
    ensure!(settled.pid().is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_binary_is_persisted_as_failed(deployment: Deployment) -> eyre::Result<()> {
    let manager = &deployment.manager;
    let svc1 = id("svc1");
    let command = LaunchCommand::new("/nonexistent/itemkeeper-demo")?;
    manager
        .create(NewItem::new(svc1.clone(), "Demo", "1.0.0").with_command(command))
        .await?;

    let result = manager.start(&svc1).await;

    ensure!(matches!(result, Err(ItemManagerError::Spawn { .. })));
    let failed = manager.get(&svc1)?;
    ensure!(failed.state() == ItemState::Failed);
    ensure!(failed.pid().is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_every_running_item(deployment: Deployment) -> eyre::Result<()> {
    let manager = &deployment.manager;
    for raw in ["svc-a", "svc-b"] {
        manager.create(shell_item(raw, "exec sleep 30")).await?;
        manager.start(&id(raw)).await?;
    }

    let results = manager.shutdown().await?;

    ensure!(results.len() == 2);
    for (item, result) in results {
        let stopped = result?;
        ensure!(stopped.state() == ItemState::Stopped, "{item} did not stop");
    }
    Ok(())
}
