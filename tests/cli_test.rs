//! Binary-level tests for the `lore` command line.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `lore` with an isolated database and no config file or model credentials
fn lore(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lore").unwrap();
    cmd.env("LORE_DB", tmp.path().join("lore.db"))
        .env_remove("LORE_AI_API_KEY")
        .env_remove("LORE_AI_BASE_URL")
        .env_remove("TAVILY_API_KEY")
        .env_remove("EXA_API_KEY")
        .arg("--config")
        .arg(tmp.path().join("missing.yaml"));
    cmd
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("sessions"));
}

#[test]
fn test_tools_json_lists_builtins() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .args(["tools", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"web_search\""))
        .stdout(predicate::str::contains("\"search_findings\""));
}

#[test]
fn test_sessions_list_on_empty_database() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));
}

#[test]
fn test_deleting_unknown_session_fails() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .args(["sessions", "delete", "nope"])
        .assert()
        .failure();
}

#[test]
fn test_malformed_server_argument_is_rejected() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .args(["tools", "--server", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=URL"));
}

#[test]
fn test_ask_without_credentials_reports_configuration() {
    let tmp = TempDir::new().unwrap();
    lore(&tmp)
        .args(["ask", "--session", "cli-1", "What is a monad?"])
        .assert()
        .success()
        .stdout(predicate::str::contains(lore::responses::AI_CONFIG_ERROR))
        .stdout(predicate::str::contains("cli-1"));

    lore(&tmp)
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cli-1"));
}
