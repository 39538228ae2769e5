//! CLI integration tests using assert_cmd
//!
//! Anything touching borg is exercised in skep-core's tests against a
//! fake binary; here we verify argument parsing and the local-only
//! paths end-to-end.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command with its data directory and database confined to `temp`.
fn skep_cmd(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skep").expect("Failed to find skep binary");
    cmd.env("XDG_DATA_HOME", temp.path())
        .env("HOME", temp.path())
        .arg("--database")
        .arg(temp.path().join("skep.db"));
    cmd
}

#[test]
fn test_help_command() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "backup orchestration for borg repositories",
        ));
}

#[test]
fn test_version_command() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("skep"));
}

#[test]
fn test_repo_help() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("repo")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage repositories"));
}

#[test]
fn test_bundle_help() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("bundle")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage backup bundles"));
}

#[test]
fn test_archive_help() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("archive")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage archives"));
}

#[test]
fn test_repo_list_empty() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("repo")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories registered."));
}

#[test]
fn test_bundle_list_empty() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("bundle")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No bundles found."));
}

#[test]
fn test_repo_info_unknown() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("repo")
        .arg("info")
        .arg("/no/such/repo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not found"));
}

#[test]
fn test_bundle_create_unknown_repo() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("bundle")
        .arg("create")
        .arg("--repo")
        .arg("/no/such/repo")
        .arg("--include")
        .arg("/tmp")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not found"));
}

#[test]
fn test_archive_show_unknown() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    skep_cmd(&temp)
        .arg("archive")
        .arg("show")
        .arg("no-such-archive")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Archive not found"));
}
