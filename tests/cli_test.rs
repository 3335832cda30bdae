//! CLI end-to-end tests

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the hlsproxy binary
#[allow(deprecated)]
fn hlsproxy_cmd() -> Command {
    Command::cargo_bin("hlsproxy").unwrap()
}

fn write_config(dir: &Path, port: u16) -> std::path::PathBuf {
    let path = dir.join("hlsproxy.toml");
    let cache_dir = dir.join("cache");
    fs::write(
        &path,
        format!(
            "[server]\nport = {port}\n\n[cache]\ndir = {:?}\n",
            cache_dir.to_string_lossy()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    hlsproxy_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    hlsproxy_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hlsproxy"));
}

#[test]
fn test_cli_url_command() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), 4321);

    hlsproxy_cmd()
        .arg("--config")
        .arg(&config)
        .args(["url", "https://cdn.example.com/v/index.m3u8"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "http://127.0.0.1:4321/v/index.m3u8?__hls_origin_url=https%3A%2F%2Fcdn.example.com%2Fv%2Findex.m3u8",
        ));
}

#[test]
fn test_cli_url_rejects_unsupported_extension() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), 4321);

    hlsproxy_cmd()
        .arg("--config")
        .arg(&config)
        .args(["url", "https://cdn.example.com/docs/manual.pdf"])
        .assert()
        .failure();
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), 4321);

    hlsproxy_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("127.0.0.1:4321"));
}

#[test]
fn test_cli_validate_rejects_public_host() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").unwrap();

    hlsproxy_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("loopback"));
}

#[test]
fn test_cli_clear_cache_and_stats() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), 4321);

    hlsproxy_cmd()
        .arg("--config")
        .arg(&config)
        .arg("clear-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache cleared"));

    hlsproxy_cmd()
        .arg("--config")
        .arg(&config)
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"disk_items\": 0"));
}
