//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test gets
//! its own data directory, so the config and slot never leak between tests.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn cli(data_dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-q", "-p", "reminder-cli", "--"])
        .args(args)
        .env("REMINDER_DATA_DIR", data_dir)
        .env_remove("REMINDER_LOG");
    cmd
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = cli(data_dir, args)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command failed: {:?}\n{}", args, stderr);
    stdout
}

fn offline(dir: &TempDir) {
    run_cli_success(dir.path(), &["config", "set", "api.enabled", "false"]);
}

#[test]
fn test_publish_and_list() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(
        dir.path(),
        &["publish", "--title", "Standup", "--content", "in 5 minutes", "--kind", "warning", "--id", "standup"],
    );
    assert!(out.contains("Notification published: standup"));

    let out = run_cli_success(dir.path(), &["list"]);
    assert!(out.contains("[WARN] Standup"));
    assert!(out.contains("id: standup"));

    let out = run_cli_success(dir.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).expect("list --json prints JSON");
    let items = parsed.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "standup");
    assert_eq!(items[0]["kind"], "warning");
}

#[test]
fn test_publish_same_id_replaces() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["publish", "--title", "First", "--id", "n1"]);
    let out = run_cli_success(dir.path(), &["publish", "--title", "Second", "--id", "n1"]);
    assert!(out.contains("Notification replaced: n1"));

    let out = run_cli_success(dir.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    assert_eq!(parsed[0]["title"], "Second");
}

#[test]
fn test_list_hides_inactive_unless_all() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["publish", "--title", "Muted", "--inactive"]);

    let out = run_cli_success(dir.path(), &["list"]);
    assert!(out.contains("No notifications."));

    let out = run_cli_success(dir.path(), &["list", "--all"]);
    assert!(out.contains("Muted"));
    assert!(out.starts_with("off"));
}

#[test]
fn test_remove_and_clear() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["publish", "--title", "A", "--id", "a"]);
    run_cli_success(dir.path(), &["publish", "--title", "B", "--id", "b"]);

    let out = run_cli_success(dir.path(), &["remove", "a"]);
    assert!(out.contains("Notification removed: a"));

    let (_, stderr, code) = run_cli(dir.path(), &["remove", "a"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("notification not found: a"));

    run_cli_success(dir.path(), &["clear"]);
    let out = run_cli_success(dir.path(), &["list", "--all"]);
    assert!(out.contains("No notifications."));
}

#[test]
fn test_publish_rejects_non_positive_ttl() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["publish", "--title", "X", "--ttl-mins", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--ttl-mins"));
}

#[test]
fn test_publish_rejects_overflowing_ttl() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["publish", "--title", "X", "--ttl-mins", "9223372036854775807"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("--ttl-mins is too large"), "{stderr}");
    assert!(!stderr.contains("panicked"));

    let out = run_cli_success(dir.path(), &["list", "--all"]);
    assert!(out.contains("No notifications."));
}

#[test]
fn test_publish_rejects_out_of_range_display_secs() {
    let dir = TempDir::new().unwrap();
    for secs in ["1e20", "0", "-3"] {
        let (_, stderr, code) = run_cli(
            dir.path(),
            &["publish", "--title", "X", &format!("--display-secs={secs}")],
        );
        assert_eq!(code, 1, "{secs}");
        assert!(stderr.contains("--display-secs"), "{stderr}");
    }
    run_cli_success(dir.path(), &["publish", "--title", "X", "--display-secs", "86400"]);
}

#[test]
fn test_list_reports_malformed_slot() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notifications.json"), "{\"not\": \"an array\"}").unwrap();

    let (_, stderr, code) = run_cli(dir.path(), &["list"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Malformed persisted data"));
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(dir.path(), &["config", "get", "api.base_url"]);
    assert_eq!(out.trim(), "http://localhost:5000/api");

    run_cli_success(dir.path(), &["config", "set", "timing.poll_interval_secs", "20"]);
    let out = run_cli_success(dir.path(), &["config", "get", "timing.poll_interval_secs"]);
    assert_eq!(out.trim(), "20");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "timing.poll_interval_secs", "soon"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);

    run_cli_success(dir.path(), &["config", "reset"]);
    let out = run_cli_success(dir.path(), &["config", "list"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["timing"]["poll_interval_secs"], 10);
}

#[test]
fn test_fetch_offline_reads_slot() {
    let dir = TempDir::new().unwrap();
    offline(&dir);
    run_cli_success(dir.path(), &["publish", "--title", "Local", "--id", "local"]);

    let out = run_cli_success(dir.path(), &["fetch", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["source"], "slot");
    assert_eq!(parsed["notifications"][0]["id"], "local");
}

#[test]
fn test_fetch_unreachable_api_falls_back() {
    let dir = TempDir::new().unwrap();
    run_cli_success(dir.path(), &["config", "set", "api.base_url", "http://127.0.0.1:1/api"]);
    run_cli_success(dir.path(), &["config", "set", "api.request_timeout_secs", "2"]);

    let (stdout, stderr, code) = run_cli(dir.path(), &["fetch", "--json"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stderr.contains("showing the slot instead"));
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["source"], "slot");
}

#[test]
fn test_watch_quits_on_q() {
    let dir = TempDir::new().unwrap();
    offline(&dir);

    let mut child = cli(dir.path(), &["watch", "--offline", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn watch");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"q\n")
        .expect("write to stdin");

    let output = child.wait_with_output().expect("watch output");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(dir.path(), &["completions", "bash"]);
    assert!(out.contains("reminder"));
}
