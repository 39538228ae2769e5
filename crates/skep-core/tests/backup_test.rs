//! End-to-end backup runs and single-archive maintenance against the
//! fake borg binary.

mod common;

use std::fs;

use tempfile::TempDir;

use common::{archive_info_json, seed_repository, FakeBorg};
use skep_core::storage::{ArchiveStore, BundleStore, Database};
use skep_core::sync::BundleSpec;
use skep_core::{BorgRunner, Bundle, Error, Reconciler, RunMode};

const REPO_PATH: &str = "/tmp/skep-repo";
const NAME_FORMAT: &str = "{hostname}-{now:%Y-%m-%dT%H:%M:%S.%f}";

struct Fixture {
    borg: FakeBorg,
    db: Database,
    data: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let data = TempDir::new().unwrap();
        fs::create_dir(data.path().join("docs")).unwrap();
        Self {
            borg: FakeBorg::new(),
            db: Database::in_memory().unwrap(),
            data,
        }
    }

    fn docs(&self) -> String {
        self.data.path().join("docs").to_string_lossy().into_owned()
    }
}

fn staged_bundle(fixture: &Fixture, reconciler: &Reconciler<'_>, repo_id: i64) -> Bundle {
    let mut spec = BundleSpec::new(repo_id);
    spec.include_paths = vec![fixture.docs()];
    let bundle = reconciler.create_bundle(&spec).unwrap();
    let command_line = bundle.command_line.as_deref().unwrap();
    let tokens: Vec<&str> = command_line.split(' ').collect();
    fixture.borg.put(
        "latest.json",
        &archive_info_json(REPO_PATH, "feed1", "testhost-2024-05-01", &tokens),
    );
    bundle
}

#[test]
fn blocking_run_persists_the_reported_archive() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);

    let archive = reconciler
        .create_backup(bundle.id, RunMode::Blocking)
        .unwrap();
    assert_eq!(archive.name, "testhost-2024-05-01");
    assert_eq!(archive.archive_id, "feed1");
    assert_eq!(archive.original_size, 1000);
    assert_eq!(archive.nfiles, 12);

    let stored = ArchiveStore::new(conn)
        .get_by_name("testhost-2024-05-01")
        .unwrap()
        .unwrap();
    assert_eq!(stored.bundle_id, bundle.id);

    let created = fixture.borg.read("created").unwrap();
    // executed with structured logging, though the stored canonical
    // command line never carries the flag
    assert!(created.contains("--log-json"));
    assert!(!bundle.command_line.unwrap().contains("--log-json"));
    assert!(created.contains("--one-file-system"));
    assert!(created.contains(&format!("{REPO_PATH}::{NAME_FORMAT}")));
    assert!(created.contains(&fixture.docs()));
}

#[test]
fn streamed_run_finishes_before_stats_are_fetched() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);

    let archive = reconciler
        .create_backup(bundle.id, RunMode::Streamed)
        .unwrap();
    assert_eq!(archive.archive_id, "feed1");
    // the create invocation was recorded before info answered
    assert!(fixture.borg.read("created").is_some());
    assert_eq!(ArchiveStore::new(conn).list_for_bundle(bundle.id).unwrap().len(), 1);
}

#[test]
fn failed_runs_are_classified_and_persist_nothing() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);

    fixture.borg.put(
        "create_error",
        r#"{"message": "Failed to create/acquire the lock", "msgid": "LockTimeout"}"#,
    );

    for mode in [RunMode::Blocking, RunMode::Streamed] {
        let err = reconciler.create_backup(bundle.id, mode).unwrap_err();
        match err {
            Error::Borg { code, .. } => assert_eq!(code, "Borg.LockTimeout"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(ArchiveStore::new(conn).list_for_bundle(bundle.id).unwrap().is_empty());
}

#[test]
fn bundle_without_a_command_line_cannot_run() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));

    let store = BundleStore::new(conn);
    let mut bundle = Bundle::new(repo.id);
    bundle.id = store.create(&bundle).unwrap();

    assert!(matches!(
        reconciler
            .create_backup(bundle.id, RunMode::Blocking)
            .unwrap_err(),
        Error::NoCommandLine
    ));
}

#[test]
fn refresh_overwrites_stored_statistics() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);
    let archive = reconciler
        .create_backup(bundle.id, RunMode::Blocking)
        .unwrap();

    // borg now reports different stats for the same archive
    let command_line = bundle.command_line.as_deref().unwrap();
    let tokens: Vec<&str> = command_line.split(' ').collect();
    let grown = archive_info_json(REPO_PATH, "feed1", &archive.name, &tokens)
        .replace("1000", "9000");
    fixture.borg.put(&format!("info_{}.json", archive.name), &grown);

    let refreshed = reconciler.refresh_archive(&archive.name).unwrap();
    assert_eq!(refreshed.original_size, 9000);
    let stored = ArchiveStore::new(conn).get(archive.id).unwrap().unwrap();
    assert_eq!(stored.original_size, 9000);
}

#[test]
fn refresh_surfaces_remote_divergence() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);
    let archive = reconciler
        .create_backup(bundle.id, RunMode::Blocking)
        .unwrap();

    // no info_<name>.json fixture: the fake answers Archive.DoesNotExist
    let err = reconciler.refresh_archive(&archive.name).unwrap_err();
    match err {
        Error::Borg { code, .. } => assert_eq!(code, "Borg.Archive.DoesNotExist"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn archive_delete_is_remote_first() {
    let fixture = Fixture::new();
    let conn = fixture.db.connection();
    let repo = seed_repository(conn, REPO_PATH, NAME_FORMAT);
    let reconciler = Reconciler::new(conn, BorgRunner::new(fixture.borg.binary()));
    let bundle = staged_bundle(&fixture, &reconciler, repo.id);
    let archive = reconciler
        .create_backup(bundle.id, RunMode::Blocking)
        .unwrap();

    fixture.borg.put(
        "delete_error",
        r#"{"message": "Failed to create/acquire the lock", "msgid": "LockTimeout"}"#,
    );
    assert!(reconciler.delete_archive(&archive.name).is_err());
    assert!(ArchiveStore::new(conn).get(archive.id).unwrap().is_some());

    fixture.borg.remove("delete_error");
    reconciler.delete_archive(&archive.name).unwrap();
    assert!(ArchiveStore::new(conn).get(archive.id).unwrap().is_none());
    assert_eq!(
        fixture.borg.read("deleted").unwrap().trim(),
        format!("{REPO_PATH}::{}", archive.name)
    );
    assert!(matches!(
        reconciler.delete_archive(&archive.name).unwrap_err(),
        Error::NotFound("archive")
    ));
}
