//! Black-box CLI tests driving the compiled binary via `assert_cmd`.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn missing_database_url_fails_fast_with_a_helpful_message() {
    let mut cmd = Command::cargo_bin("memory-cli").expect("binary should build");
    cmd.env_remove("MEMORY_DATABASE_URL");
    cmd.arg("health");
    cmd.assert().failure();
}

#[test]
fn help_lists_all_subcommands() {
    let mut cmd = Command::cargo_bin("memory-cli").expect("binary should build");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("migrate"))
        .stdout(contains("health"))
        .stdout(contains("node"))
        .stdout(contains("edge"));
}

#[test]
fn health_reports_connectivity_against_a_local_database() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let mut cmd = Command::cargo_bin("memory-cli").expect("binary should build");
    cmd.env("MEMORY_DATABASE_URL", format!("file:{}", db_path.display()));
    cmd.env("MEMORY_REDB_PATH", redb_path.display().to_string());
    cmd.env("MEMORY_PROJECT_ID", "demo-project");
    cmd.arg("health");
    cmd.assert().success().stdout(contains("turso: ok")).stdout(contains("redb:  ok"));
}

#[test]
fn node_add_then_get_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let mut add = Command::cargo_bin("memory-cli").expect("binary should build");
    add.env("MEMORY_DATABASE_URL", format!("file:{}", db_path.display()));
    add.env("MEMORY_REDB_PATH", redb_path.display().to_string());
    add.env("MEMORY_PROJECT_ID", "demo-project");
    add.args(["node", "add", "demo-project", "Person", "Ada"]);
    add.assert().success();

    let mut get = Command::cargo_bin("memory-cli").expect("binary should build");
    get.env("MEMORY_DATABASE_URL", format!("file:{}", db_path.display()));
    get.env("MEMORY_REDB_PATH", redb_path.display().to_string());
    get.env("MEMORY_PROJECT_ID", "demo-project");
    get.args(["node", "get", "demo-project", "Ada"]);
    get.assert().success().stdout(contains("Ada"));
}
