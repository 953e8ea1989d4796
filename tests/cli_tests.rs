//! Binary-level tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn warden() -> Command {
    let mut cmd = Command::cargo_bin("warden").expect("binary builds");
    // Isolate from the developer's environment and any .env file.
    cmd.current_dir(std::env::temp_dir())
        .env_remove("WARDEN_API_SERVER")
        .env_remove("WARDEN_API_TOKEN")
        .env_remove("WARDEN_API_TOKEN_FILE")
        .env_remove("WARDEN_SERVICE_HOST")
        .env_remove("WARDEN_SERVICE_PORT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_mentions_the_log_level_flag() {
    warden()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-level"));
}

#[test]
fn exits_one_when_discovery_finds_no_endpoint() {
    // No endpoint anywhere: startup must fail fast, before any cleanup.
    warden().assert().code(1);
}

#[test]
fn exits_one_on_unreadable_config() {
    warden()
        .args(["--config", "/definitely/not/here.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config"));
}
