//! CLI integration tests.
//!
//! Run the compiled binary for commands that need no cluster.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn probe() -> Command {
    let mut cmd = Command::cargo_bin("longhorn-probe").unwrap();
    cmd.env_remove("LONGHORN_PROBE_CONFIG")
        .env_remove("LONGHORN_PROBE_FORMAT")
        .env_remove("LONGHORN_PROBE_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_version_command() {
    probe()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("longhorn-probe "));
}

#[test]
fn test_list_command() {
    probe()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("CLU-001").and(predicate::str::contains("CLN-001")));
}

#[test]
fn test_help() {
    probe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("templates"));
}

#[test]
fn test_invalid_format_is_usage_error() {
    probe().args(["--format", "yaml", "list"]).assert().code(2);
}

#[test]
fn test_check_options_before_subcommand_are_usage_error() {
    probe()
        .args(["--category", "longhorn", "--skip", "VOL-004", "check"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("after the subcommand"));
}

#[test]
fn test_invalid_config_is_runtime_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("probe.toml");
    fs::write(&config, "[volume]\nunknown_key = 1\n").unwrap();

    probe()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_kubectl_is_runtime_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("probe.toml");
    fs::write(&config, "[kubectl]\nbinary = \"/nonexistent/kubectl\"\n").unwrap();

    probe()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_templates_valid_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("longhorn.yaml"), "machine:\n  kubelet: {}\n").unwrap();
    fs::write(
        dir.path().join("talconfig.yaml"),
        "clusterName: lab\npatches:\n  - \"@longhorn.yaml\"\n",
    )
    .unwrap();

    probe()
        .arg("templates")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("TPL-002").and(predicate::str::contains("1 patches resolved")));
}

#[test]
fn test_templates_unresolved_patch_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("talconfig.yaml"), "patches:\n  - \"@gone.yaml\"\n").unwrap();

    probe()
        .args(["--format", "json", "templates"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"fail\""));
}

#[test]
fn test_templates_missing_directory() {
    let dir = TempDir::new().unwrap();

    probe()
        .arg("templates")
        .arg(dir.path().join("absent"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not a directory"));
}
