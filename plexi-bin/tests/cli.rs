//! End-to-end tests of the command-line interface.
//!
//! Everything here runs without network access: token management works
//! against a temporary config directory, and the one `query` test
//! exercises only the pre-flight token check.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn main_command() -> Command {
    let mut cmd = Command::cargo_bin("plexi").expect("plexi binary not found");
    // Never touch the real token store of whoever runs the tests.
    cmd.env_remove("PLEXI_TOKEN");
    cmd
}

fn isolated() -> (TempDir, Command) {
    let dir = TempDir::new().expect("cannot create temp dir");
    let mut cmd = main_command();
    cmd.env("PLEXI_CONFIG_DIR", dir.path());
    (dir, cmd)
}

#[test]
fn test_help_lists_subcommands() {
    main_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("threads"));
}

#[test]
fn test_version() {
    main_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_status_without_token() {
    let (_dir, mut cmd) = isolated();
    cmd.arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not authenticated"));
}

#[test]
fn test_auth_then_status_round_trip() {
    let dir = TempDir::new().unwrap();

    let mut auth = main_command();
    auth.env("PLEXI_CONFIG_DIR", dir.path())
        .args(["auth", "pplx-test-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token saved"));

    let mut status = main_command();
    status
        .env("PLEXI_CONFIG_DIR", dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authenticated"));
}

#[test]
fn test_auth_reads_token_from_stdin() {
    let (_dir, mut cmd) = isolated();
    cmd.arg("auth")
        .write_stdin("pplx-stdin-token\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Token saved"));
}

#[test]
fn test_logout_without_token() {
    let (_dir, mut cmd) = isolated();
    cmd.arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("No token was stored"));
}

#[test]
fn test_auth_rejects_empty_token() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["auth", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("token must not be empty"));
}

#[test]
fn test_query_without_token_fails_with_hint() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["query", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plexi auth"));
}

#[test]
fn test_query_requires_an_argument() {
    main_command().arg("query").assert().failure();
}

#[test]
fn test_invalid_output_format_is_rejected() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["query", "anything", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["--config", "/definitely/not/there.toml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read configuration file"));
}
