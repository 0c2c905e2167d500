//! Integration tests for the vigil binary.
//!
//! The binary lives in another package, so these skip when it hasn't
//! been built (`cargo build -p vigil-watcher` first).

use std::io::Write;
use std::process::{Command, Output};

use crate::helpers::{settle, watcher_binary, FakeNode};

fn run_watcher(args: &[&str]) -> Option<Output> {
    let Some(binary) = watcher_binary() else {
        eprintln!("skipping: vigil binary not built");
        return None;
    };
    let output = Command::new(binary)
        .args(args)
        .env_remove("VIGIL_CONFIG")
        .env_remove("VIGIL_HOSTS")
        .env_remove("VIGIL_FRESH_START")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run vigil");
    Some(output)
}

#[test]
fn config_template_prints_toml() {
    let Some(output) = run_watcher(&["--config-template"]) else {
        return;
    };
    assert!(output.status.success(), "exit code: {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("check_interval_ms"),
        "expected template in stdout, got: {stdout}"
    );
    assert!(stdout.contains("[store]"), "got: {stdout}");
}

#[test]
fn fresh_start_without_hosts_is_fatal() {
    let Some(output) = run_watcher(&["--fresh-start"]) else {
        return;
    };
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "got stderr: {stderr}");
}

#[test]
fn unreachable_store_is_fatal() {
    let store = FakeNode::store();
    let port = store.addr().port().to_string();
    drop(store);
    settle();

    let Some(output) = run_watcher(&[
        "--hosts",
        "127.0.0.1:1",
        "--store-host",
        "127.0.0.1",
        "--store-port",
        &port,
    ]) else {
        return;
    };
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unreachable"), "got stderr: {stderr}");
}

#[test]
fn bad_config_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "no_such_field = 1").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let Some(output) = run_watcher(&["--config", &path]) else {
        return;
    };
    assert_eq!(output.status.code(), Some(1));
}
