//! Integration tests for the `catalog` CLI binary.
//!
//! Argument parsing, config handling and completions run offline; fetch
//! tests point the binary at a local wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `catalog` binary with env isolation.
///
/// Clears all `CATALOG_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn catalog_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("catalog");
    cmd.env("HOME", "/tmp/catalog-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/catalog-cli-test-nonexistent")
        .env_remove("CATALOG_CONFIG")
        .env_remove("CATALOG_OUTPUT")
        .env_remove("CATALOG_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// `catalog` bound to a config file inside `dir`.
fn catalog_with_config(dir: &Path) -> assert_cmd::Command {
    let mut cmd = catalog_cmd();
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a prepared command off the async test thread.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

async fn object_server(route: &str, status: u16, body: &str, expected_hits: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.as_bytes().to_vec(), "text/plain"),
        )
        .expect(expected_hits)
        .mount(&server)
        .await;
    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let output = catalog_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn help_lists_commands() {
    catalog_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("resource cache")
            .and(predicate::str::contains("fetch"))
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn version_flag() {
    catalog_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("catalog"));
}

#[test]
fn completions_bash() {
    catalog_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn fetch_requires_a_url() {
    catalog_cmd().arg("fetch").assert().code(2);
}

#[test]
fn fetch_rejects_invalid_urls() {
    let dir = tempfile::tempdir().unwrap();
    catalog_with_config(dir.path())
        .args(["fetch", "not-a-url"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid value for url"));
}

#[test]
fn repeat_must_be_positive() {
    catalog_cmd()
        .args(["fetch", "--repeat", "0", "https://example.com/a"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    catalog_with_config(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();

    catalog_with_config(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    catalog_with_config(dir.path())
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    catalog_with_config(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();

    catalog_with_config(dir.path())
        .args(["-o", "json-compact", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""release_grace_ms":5000"#));
}

#[cfg(target_os = "linux")]
#[test]
fn config_init_uses_the_platform_path_without_a_flag() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("catalog").join("config.toml");

    catalog_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(expected.exists());

    std::fs::write(&expected, "[fetch]\ntimeout_secs = 9\n").unwrap();
    catalog_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_secs = 9"));
}

#[test]
fn config_show_applies_env_overrides() {
    let dir = tempfile::tempdir().unwrap();
    catalog_with_config(dir.path())
        .env("CATALOG_FETCH__TIMEOUT_SECS", "7")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_secs = 7"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[defaults]\noutput = \"xml\"\n").unwrap();
    catalog_with_config(dir.path())
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("defaults.output"));
}

// ── Fetch ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn repeated_requests_share_one_fetch() {
    let server = object_server("/bucket/readme.md", 200, "# hello", 1).await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = catalog_with_config(dir.path());
    cmd.args(["-o", "json-compact", "fetch", "--repeat", "6"])
        .arg(format!("{}/bucket/readme.md", server.uri()));
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["requests"], 6);
    assert_eq!(report["summary"]["fetches"], 1);
    assert_eq!(report["objects"][0]["state"], "ok");
    assert_eq!(report["objects"][0]["bytes"], 7);
    assert_eq!(report["objects"][0]["content_type"], "text/plain");
}

#[tokio::test(flavor = "multi_thread")]
async fn refetch_runs_a_second_fetch() {
    let server = object_server("/bucket/data.csv", 200, "a,b", 2).await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = catalog_with_config(dir.path());
    cmd.args(["-o", "json-compact", "fetch", "--refetch", "-n", "3"])
        .arg(format!("{}/bucket/data.csv", server.uri()));
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["passes"], 2);
    assert_eq!(report["summary"]["requests"], 6);
    assert_eq!(report["summary"]["fetches"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_object_exits_with_not_found() {
    let server = object_server("/bucket/gone", 404, "", 1).await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = catalog_with_config(dir.path());
    cmd.args(["--color", "never", "fetch", "-n", "4"])
        .arg(format!("{}/bucket/gone", server.uri()));
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("err"), "{stdout}");
    assert!(stdout.contains("4 requests, 1 fetches"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_output_lists_each_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .expect(2)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = catalog_with_config(dir.path());
    cmd.args(["-o", "plain", "fetch"])
        .arg(format!("{}/a", server.uri()))
        .arg(format!("{}/b", server.uri()));
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.ends_with("\tok")));
}

#[test]
fn unreachable_host_exits_with_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    catalog_with_config(dir.path())
        .args(["--timeout", "5", "fetch", "http://127.0.0.1:9/object"])
        .assert()
        .code(7);
}
