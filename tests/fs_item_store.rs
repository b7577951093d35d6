//! Integration tests for the filesystem item store.

use chrono::Utc;
use eyre::{bail, ensure};
use itemkeeper::item::{
    adapters::fs::{FsItemStore, RECORD_FILE_NAME},
    domain::{ItemId, ItemState, LaunchCommand, NewItem, ProcessId},
    ports::{ItemStore, StoreError},
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

struct StoreRoot {
    dir: TempDir,
    store: FsItemStore,
}

#[fixture]
fn store_root() -> StoreRoot {
    let dir = TempDir::new().expect("create storage root");
    let store = FsItemStore::new(dir.path());
    StoreRoot { dir, store }
}

fn id(raw: &str) -> ItemId {
    ItemId::new(raw).expect("valid id")
}

fn new_item(raw: &str) -> NewItem {
    let command = LaunchCommand::new("/bin/sleep")
        .expect("valid command")
        .with_args(["30"])
        .with_working_directory("/tmp");
    NewItem::new(id(raw), format!("Service {raw}"), "2.1.0")
        .with_url("https://items.example.test/svc")
        .with_command(command)
}

#[rstest]
fn created_item_round_trips_through_disk(store_root: StoreRoot) -> eyre::Result<()> {
    let created = store_root.store.create(new_item("svc1"), Utc::now())?;

    ensure!(
        store_root
            .dir
            .path()
            .join("svc1")
            .join(RECORD_FILE_NAME)
            .is_file()
    );
    let loaded = store_root.store.load(&id("svc1"))?;
    ensure!(loaded == created, "loaded {loaded:?} differs from {created:?}");
    ensure!(loaded.state() == ItemState::Stopped);
    Ok(())
}

#[rstest]
fn saved_transitions_survive_a_new_store(store_root: StoreRoot) -> eyre::Result<()> {
    let clock = DefaultClock;
    let mut item = store_root.store.create(new_item("svc1"), Utc::now())?;
    item.begin_start(&clock)?;
    item.mark_running(ProcessId::from_raw(4321), &clock)?;
    store_root.store.save(&item)?;

    let reopened = FsItemStore::new(store_root.dir.path());
    let loaded = reopened.load(&id("svc1"))?;

    ensure!(loaded.state() == ItemState::Running);
    ensure!(loaded.pid() == Some(ProcessId::from_raw(4321)));
    ensure!(
        !store_root.dir.path().join("svc1").join(".item.json.tmp").exists(),
        "staging file must not outlive a save"
    );
    Ok(())
}

#[rstest]
fn duplicate_create_is_rejected(store_root: StoreRoot) -> eyre::Result<()> {
    store_root.store.create(new_item("svc1"), Utc::now())?;

    let result = store_root.store.create(new_item("svc1"), Utc::now());

    if !matches!(result, Err(StoreError::AlreadyExists(_))) {
        bail!("expected AlreadyExists, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn invalid_fields_leave_no_directory_behind(store_root: StoreRoot) -> eyre::Result<()> {
    let result = store_root
        .store
        .create(NewItem::new(id("svc1"), "CON", "1.0"), Utc::now());

    ensure!(matches!(result, Err(StoreError::InvalidName(_))));
    ensure!(!store_root.dir.path().join("svc1").exists());
    Ok(())
}

#[rstest]
#[case::not_json("not json")]
#[case::unknown_field(r#"{"id":"svc1","surprise":true}"#)]
fn unreadable_record_is_corrupted(store_root: StoreRoot, #[case] contents: &str) -> eyre::Result<()> {
    store_root.store.create(new_item("svc1"), Utc::now())?;
    fs::write(
        store_root.dir.path().join("svc1").join(RECORD_FILE_NAME),
        contents,
    )?;

    let result = store_root.store.load(&id("svc1"));

    if !matches!(result, Err(StoreError::Corrupted { .. })) {
        bail!("expected Corrupted, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn directory_without_record_is_corrupted(store_root: StoreRoot) -> eyre::Result<()> {
    fs::create_dir(store_root.dir.path().join("svc1"))?;

    let result = store_root.store.load(&id("svc1"));

    ensure!(matches!(result, Err(StoreError::Corrupted { .. })));
    Ok(())
}

#[rstest]
fn missing_item_is_not_found(store_root: StoreRoot) {
    assert!(matches!(
        store_root.store.load(&id("ghost")),
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store_root.store.delete(&id("ghost")),
        Err(StoreError::NotFound(_))
    ));
}

#[rstest]
fn list_is_sorted_and_skips_unreadable_entries(store_root: StoreRoot) -> eyre::Result<()> {
    for raw in ["svc-c", "svc-a", "svc-b"] {
        store_root.store.create(new_item(raw), Utc::now())?;
    }
    fs::write(
        store_root.dir.path().join("svc-b").join(RECORD_FILE_NAME),
        "{",
    )?;
    fs::write(store_root.dir.path().join("notes.txt"), "ignored")?;
    fs::create_dir(store_root.dir.path().join("not an id"))?;

    let listed: Vec<String> = store_root
        .store
        .list()?
        .iter()
        .map(|item| item.id().as_str().to_owned())
        .collect();

    ensure!(listed == ["svc-a", "svc-c"], "unexpected listing {listed:?}");
    Ok(())
}

#[rstest]
fn delete_removes_the_item_directory(store_root: StoreRoot) -> eyre::Result<()> {
    store_root.store.create(new_item("svc1"), Utc::now())?;

    store_root.store.delete(&id("svc1"))?;

    ensure!(!store_root.dir.path().join("svc1").exists());
    ensure!(store_root.store.list()?.is_empty());
    Ok(())
}

#[cfg(unix)]
mod links {
    use super::*;
    use std::os::unix::fs::symlink;

    struct Escape {
        root: StoreRoot,
        outside: TempDir,
    }

    /// Plants `svc1` as a link to a well-formed item directory outside the
    /// root.
    #[fixture]
    fn escape(store_root: StoreRoot) -> Escape {
        let outside = TempDir::new().expect("create outside dir");
        let foreign = FsItemStore::new(outside.path());
        foreign
            .create(new_item("svc1"), Utc::now())
            .expect("create foreign item");
        symlink(
            outside.path().join("svc1"),
            store_root.dir.path().join("svc1"),
        )
        .expect("plant link");
        Escape {
            root: store_root,
            outside,
        }
    }

    #[rstest]
    fn linked_item_directory_is_unsafe(escape: Escape) {
        assert!(matches!(
            escape.root.store.load(&id("svc1")),
            Err(StoreError::Unsafe(_))
        ));
    }

    #[rstest]
    fn delete_does_not_follow_links(escape: Escape) -> eyre::Result<()> {
        let result = escape.root.store.delete(&id("svc1"));

        ensure!(matches!(result, Err(StoreError::Unsafe(_))));
        ensure!(
            escape
                .outside
                .path()
                .join("svc1")
                .join(RECORD_FILE_NAME)
                .is_file(),
            "target of the link must survive"
        );
        Ok(())
    }

    #[rstest]
    fn list_skips_linked_entries(escape: Escape) -> eyre::Result<()> {
        escape.root.store.create(new_item("svc2"), Utc::now())?;

        let listed = escape.root.store.list()?;

        ensure!(listed.len() == 1);
        ensure!(listed.iter().all(|item| item.id().as_str() == "svc2"));
        Ok(())
    }

    #[rstest]
    fn create_over_a_dangling_link_is_rejected(store_root: StoreRoot) -> eyre::Result<()> {
        symlink("/nonexistent/target", store_root.dir.path().join("svc1"))?;

        let result = store_root.store.create(new_item("svc1"), Utc::now());

        ensure!(matches!(result, Err(StoreError::AlreadyExists(_))));
        Ok(())
    }
}
