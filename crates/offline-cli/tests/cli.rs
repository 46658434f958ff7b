//! Runs the `offline-launcher` binary against a throwaway store.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn launcher(store: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_offline-launcher"))
        .args(args)
        .arg("--store")
        .arg(store)
        .args(["--backend", "none"])
        .env_remove("OFFLINE_LAUNCHER_STORE_KIND")
        .env_remove("OFFLINE_LAUNCHER_BACKEND")
        .env("OFFLINE_LAUNCHER_LOG", "error")
        .output()
        .unwrap()
}

fn list_json(store: &Path) -> serde_json::Value {
    let output = launcher(store, &["list", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn add_list_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("programs.json");
    let app = dir.path().join("app.exe");
    fs::write(&app, b"").unwrap();

    let output = launcher(&store, &["add", app.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let listed = list_json(&store);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["status"], "session_active");
    assert_eq!(listed[0]["label"], "session active");

    let output = launcher(&store, &["remove", "0"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(list_json(&store), serde_json::json!([]));
}

#[test]
fn validation_errors_exit_with_1() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("programs.json");
    let missing = dir.path().join("missing.exe");

    let output = launcher(&store, &["add", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));

    let output = launcher(&store, &["remove", "5"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn block_without_backend_exits_with_2() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("programs.json");
    let app = dir.path().join("app.exe");
    fs::write(&app, b"").unwrap();
    launcher(&store, &["add", app.to_str().unwrap()]);

    let output = launcher(&store, &["block", app.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(list_json(&store)[0]["status"], "session_active");
}

#[test]
fn unreadable_store_exits_with_3() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the store file should be cannot be read as one.
    let store = dir.path().join("programs.json");
    fs::create_dir(&store).unwrap();

    let output = launcher(&store, &["list"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn corrupt_store_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("programs.json");
    fs::write(&store, b"not json").unwrap();

    let output = launcher(&store, &["list"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("starting with an empty list"));
    assert!(!store.exists());
}

#[test]
fn check_reports_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("programs.json");
    let output = launcher(&store, &["check"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("backend: none"));
}
