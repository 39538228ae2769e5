//! Shared fixtures: a fake borg binary driven by canned response files

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use skep_core::model::Repository;
use skep_core::storage::RepositoryStore;

/// A stand-in for the borg binary: a shell script that answers from
/// canned files placed next to it.
///
/// Responses: `info.json` (repository info), `latest.json` (info with
/// `--last`), `list.json`, `info_<archive>.json` (per-archive info).
/// Failures: `init_error`, `list_error`, `delete_error`, `check_error`,
/// `create_error`, `fail_<archive>` (stderr payload, exit 2). Every
/// `delete` target is appended to `deleted`, every `create` argv to
/// `created`.
pub struct FakeBorg {
    dir: TempDir,
}

impl FakeBorg {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("fake borg dir");
        let script = dir.path().join("borg");
        fs::write(&script, SCRIPT).expect("write fake borg");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod fake borg");
        Self { dir }
    }

    pub fn binary(&self) -> String {
        self.dir.path().join("borg").to_string_lossy().into_owned()
    }

    pub fn put(&self, name: &str, contents: &str) {
        fs::write(self.dir.path().join(name), contents).expect("write fixture");
    }

    pub fn remove(&self, name: &str) {
        let _ = fs::remove_file(self.dir.path().join(name));
    }

    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(name)).ok()
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

const SCRIPT: &str = r#"#!/bin/sh
DIR="$(cd "$(dirname "$0")" && pwd)"
cmd=""
target=""
limited=0
for a in "$@"; do
    case "$a" in
        init|info|list|delete|check|create)
            [ -z "$cmd" ] && cmd="$a"
            ;;
        --last|--first)
            limited=1
            ;;
        --*)
            ;;
        *)
            target="$a"
            ;;
    esac
done

fail_from() {
    cat "$1" >&2
    exit 2
}

case "$cmd" in
    init)
        [ -f "$DIR/init_error" ] && fail_from "$DIR/init_error"
        exit 0
        ;;
    info)
        case "$target" in
            *::*)
                name="${target##*::}"
                [ -f "$DIR/fail_$name" ] && fail_from "$DIR/fail_$name"
                if [ -f "$DIR/info_$name.json" ]; then
                    cat "$DIR/info_$name.json"
                    exit 0
                fi
                printf '{"message": "Archive %s does not exist", "msgid": "Archive.DoesNotExist"}' "$name" >&2
                exit 2
                ;;
            *)
                [ -f "$DIR/info_error" ] && fail_from "$DIR/info_error"
                if [ "$limited" = 1 ]; then
                    cat "$DIR/latest.json"
                else
                    cat "$DIR/info.json"
                fi
                exit 0
                ;;
        esac
        ;;
    list)
        [ -f "$DIR/list_error" ] && fail_from "$DIR/list_error"
        cat "$DIR/list.json"
        exit 0
        ;;
    delete)
        [ -f "$DIR/delete_error" ] && fail_from "$DIR/delete_error"
        echo "$target" >> "$DIR/deleted"
        exit 0
        ;;
    check)
        [ -f "$DIR/check_error" ] && fail_from "$DIR/check_error"
        exit 0
        ;;
    create)
        echo "$@" >> "$DIR/created"
        [ -f "$DIR/create_error" ] && fail_from "$DIR/create_error"
        echo "progress line one"
        echo "progress line two"
        exit 0
        ;;
    *)
        echo "usage: borg [-h] ..." >&2
        echo "borg: error: invalid choice" >&2
        echo "" >&2
        exit 2
        ;;
esac
"#;

pub fn repo_info_json(repo_id: &str, path: &str) -> String {
    json!({
        "cache": {
            "path": "/home/user/.cache/borg/cafe",
            "stats": {
                "total_chunks": 120,
                "total_csize": 40_000,
                "total_size": 50_000,
                "total_unique_chunks": 100,
                "unique_csize": 35_000,
                "unique_size": 42_000
            }
        },
        "encryption": { "mode": "repokey" },
        "repository": {
            "id": repo_id,
            "last_modified": "2024-05-01T09:30:00.000000",
            "location": path
        },
        "security_dir": "/home/user/.config/borg/security/cafe"
    })
    .to_string()
}

pub fn archive_info_json(repo_path: &str, id: &str, name: &str, command_line: &[&str]) -> String {
    json!({
        "archives": [{
            "id": id,
            "name": name,
            "comment": "",
            "start": "2024-05-01T09:00:00.000000",
            "end": "2024-05-01T09:05:00.000000",
            "duration": 300.0,
            "hostname": "testhost",
            "username": "tester",
            "command_line": command_line,
            "stats": {
                "original_size": 1000,
                "compressed_size": 800,
                "deduplicated_size": 600,
                "nfiles": 12
            }
        }],
        "repository": {
            "id": "cafe",
            "last_modified": "2024-05-01T09:30:00.000000",
            "location": repo_path
        }
    })
    .to_string()
}

pub fn list_json(entries: &[(&str, &str, &[&str])]) -> String {
    let archives: Vec<_> = entries
        .iter()
        .map(|(id, name, command_line)| {
            json!({
                "id": id,
                "name": name,
                "start": "2024-05-01T09:00:00.000000",
                "command_line": command_line
            })
        })
        .collect();
    json!({ "archives": archives }).to_string()
}

/// Insert a repository row directly, bypassing borg.
pub fn seed_repository(conn: &rusqlite::Connection, path: &str, name_format: &str) -> Repository {
    let mut repo = Repository {
        id: 0,
        repo_id: format!("seed-{}", path.replace('/', "-")),
        path: path.to_string(),
        name_format: name_format.to_string(),
        last_modified: None,
        encryption_mode: "repokey".to_string(),
        encryption_keyfile: None,
        cache_path: None,
        security_dir: None,
        total_chunks: 0,
        total_unique_chunks: 0,
        total_size: 0,
        total_csize: 0,
        unique_size: 0,
        unique_csize: 0,
        user_id: 1,
    };
    repo.id = RepositoryStore::new(conn)
        .create(&repo)
        .expect("seed repository");
    repo
}
