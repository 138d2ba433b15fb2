//! Black-box tests driving the compiled `memory-mcp-server` binary over stdio.

use assert_cmd::Command;
use predicates::str::contains;

fn base_cmd(db_path: &std::path::Path, redb_path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("memory-mcp-server").expect("binary should build");
    cmd.env("MEMORY_DATABASE_URL", format!("file:{}", db_path.display()));
    cmd.env("MEMORY_REDB_PATH", redb_path.display().to_string());
    cmd.env("MEMORY_PROJECT_ID", "demo-project");
    cmd.env("MEMORY_WATCHDOG_ENABLED", "false");
    cmd
}

#[test]
fn initialize_then_tools_list_round_trips_over_stdio() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#,
        "\n",
    );

    let mut cmd = base_cmd(&db_path, &redb_path);
    cmd.write_stdin(input);
    cmd.assert()
        .success()
        .stdout(contains("protocolVersion"))
        .stdout(contains("graph_add_node"));
}

#[test]
fn resources_list_advertises_all_five_tiers() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let input = concat!(r#"{"jsonrpc":"2.0","id":1,"method":"resources/list","params":{}}"#, "\n");

    let mut cmd = base_cmd(&db_path, &redb_path);
    cmd.write_stdin(input);
    cmd.assert()
        .success()
        .stdout(contains("memory://working-memory"))
        .stdout(contains("memory://stale-memory"));
}

#[test]
fn graph_add_node_then_get_round_trips_via_tools_call() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"graph_add_node","arguments":{"label":"Person","name":"Ada"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_node_by_name","arguments":{"name":"Ada"}}}"#,
        "\n",
    );

    let mut cmd = base_cmd(&db_path, &redb_path);
    cmd.write_stdin(input);
    cmd.assert().success().stdout(contains("found")).stdout(contains("Ada"));
}

#[test]
fn missing_database_url_fails_fast() {
    let mut cmd = Command::cargo_bin("memory-mcp-server").expect("binary should build");
    cmd.env_remove("MEMORY_DATABASE_URL");
    cmd.env("MEMORY_PROJECT_ID", "demo-project");
    cmd.assert().failure();
}

#[test]
fn notifications_without_an_id_produce_no_response() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let db_path = dir.path().join("memory.db");
    let redb_path = dir.path().join("cache.redb");

    let input = concat!(r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#, "\n");

    let mut cmd = base_cmd(&db_path, &redb_path);
    cmd.write_stdin(input);
    cmd.assert().success().stdout(predicates::str::is_empty());
}
