//! Integration tests for the `vss-client` binary entry point.
//!
//! Runs the binary non-interactively from an empty working directory so no
//! configuration file or history is picked up.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn client(workdir: &TempDir) -> Command {
    let mut command = cargo_bin_cmd!("vss-client");
    command
        .current_dir(workdir.path())
        .env_remove("VSS_SERVER_HOST")
        .env_remove("VSS_SERVER_PORT")
        .env_remove("VSS_CONFIG_PATH");
    command
}

#[test]
fn prints_the_default_server_address() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .args(["--no-connect", "--command", "getServerAddress"])
        .assert()
        .success()
        .stdout("localhost:8090\n");
}

#[test]
fn configuration_flags_override_the_address() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .args([
            "--no-connect",
            "--server-host",
            "10.1.2.3",
            "--command",
            "getServerAddress",
            "--server-port=9001",
        ])
        .assert()
        .success()
        .stdout("10.1.2.3:9001\n");
}

#[test]
fn environment_sets_the_address() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .env("VSS_SERVER_PORT", "8555")
        .args(["--no-connect", "-c", "getServerAddress"])
        .assert()
        .success()
        .stdout(contains(":8555"));
}

#[test]
fn requests_fail_when_not_connected() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .args(["--no-connect", "--command", "getValue Vehicle.Speed"])
        .assert()
        .failure()
        .stderr(contains("not connected"));
}

#[test]
fn unknown_commands_fail() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .args(["--no-connect", "--command", "frobnicate"])
        .assert()
        .failure()
        .stderr(contains("frobnicate"));
}

#[test]
fn invalid_log_filter_is_rejected() {
    let workdir = TempDir::new().expect("workdir");
    client(&workdir)
        .args([
            "--no-connect",
            "--log-filter",
            "vss_bridge=notalevel",
            "-c",
            "getServerAddress",
        ])
        .assert()
        .failure()
        .stderr(contains("invalid log filter"));
}
