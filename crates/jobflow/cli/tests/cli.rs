//! Binary-level checks that need no running daemon

use assert_cmd::Command;
use predicates::prelude::*;

fn jobflow() -> Command {
    let mut cmd = Command::cargo_bin("jobflow").unwrap();
    cmd.env("JOBFLOW_ENDPOINT", "http://127.0.0.1:1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    jobflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("deleteall"));
}

#[test]
fn test_deleteall_without_source_is_usage_error() {
    jobflow()
        .arg("deleteall")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--directory").or(predicate::str::contains("--filename")));
}

#[test]
fn test_missing_manifest_fails_before_contacting_daemon() {
    jobflow()
        .args(["deleteall", "-f", "does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.yaml"));
}

#[test]
fn test_unreachable_daemon_reports_error() {
    jobflow()
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("HTTP error"));
}
