//! Integration tests for the interactive session loop via piped stdin.

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn session_lines(env: &TestEnv, input: &str) -> Vec<serde_json::Value> {
    let output = env
        .pb()
        .args(["session"])
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "session failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_session_requires_init() {
    let env = TestEnv::new();

    env.pb()
        .args(["session"])
        .write_stdin("quit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not initialized"));
}

#[test]
fn test_session_ready_line() {
    let env = TestEnv::init();

    let lines = session_lines(&env, "quit\n");
    assert_eq!(lines[0]["session"], "ready");
    assert_eq!(lines[0]["project"], "default");
}

#[test]
fn test_directive_persists_ai_generated_snapshot() {
    let env = TestEnv::init();

    let lines = session_lines(
        &env,
        "Sure: {\"action\": \"add_task\", \"title\": \"Design\"}\nquit\n",
    );
    assert_eq!(lines[1]["applied"]["action"], "add_task");
    assert_eq!(lines[1]["saved"], true);

    let listed = env.pb_json(&["snapshot", "list", "--kind", "ai_generated"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // The task survives into one-shot commands.
    let tasks = env.pb_json(&["task", "list"]);
    assert!(tasks["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["title"] == "Design"));
}

#[test]
fn test_undo_within_session_and_flush_on_exit() {
    let env = TestEnv::init();

    let lines = session_lines(
        &env,
        "{\"action\": \"add_task\", \"title\": \"Design\"}\nundo\nquit\n",
    );
    let undo_line = &lines[2];
    assert_eq!(undo_line["action"], "undo");
    assert_eq!(undo_line["applied"], true);

    // Undo left the board dirty, so the session flushed a manual save.
    let flush = lines.last().unwrap();
    assert_eq!(flush["action"], "flush");
    assert_eq!(flush["outcome"]["saved"], true);

    // Only the starter card remains after the undo.
    let tasks = env.pb_json(&["task", "list"]);
    assert_eq!(tasks["tasks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_redo_after_undo() {
    let env = TestEnv::init();

    let lines = session_lines(
        &env,
        "{\"action\": \"add_task\", \"title\": \"Design\"}\nundo\nredo\nsave done\nquit\n",
    );
    assert_eq!(lines[3]["action"], "redo");
    assert_eq!(lines[3]["applied"], true);
    assert_eq!(lines[4]["outcome"]["saved"], true);

    let tasks = env.pb_json(&["task", "list"]);
    assert_eq!(tasks["tasks"].as_array().unwrap().len(), 2);
}

#[test]
fn test_malformed_line_reports_error_and_continues() {
    let env = TestEnv::init();

    let lines = session_lines(&env, "add a task please\nshow\nquit\n");
    assert!(lines[1]["error"].as_str().is_some());
    assert!(lines[2]["nodes"].is_array());
}

#[test]
fn test_self_loop_directive_reports_error() {
    let env = TestEnv::init();

    let lines = session_lines(
        &env,
        "{\"action\": \"add_task\", \"title\": \"Solo\"}\nundo\nredo\nquit\n",
    );
    let id = lines[1]["applied"]["node_id"].as_str().unwrap().to_string();

    let lines = session_lines(
        &env,
        &format!("{{\"action\": \"connect\", \"source\": \"{id}\", \"target\": \"{id}\"}}\nquit\n"),
    );
    assert!(lines[1]["error"]
        .as_str()
        .unwrap()
        .contains("not allowed"));
}

#[test]
fn test_session_reset_restores_starter() {
    let env = TestEnv::init();

    let lines = session_lines(
        &env,
        "{\"action\": \"add_task\", \"title\": \"Design\"}\nreset\nshow\nquit\n",
    );
    assert_eq!(lines[2]["action"], "reset");
    let board = &lines[3];
    assert_eq!(board["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(board["nodes"][0]["data"]["title"], "Welcome to your board");
}

#[test]
fn test_eof_ends_session_cleanly() {
    let env = TestEnv::init();

    // No explicit quit; EOF after the directive.
    let lines = session_lines(&env, "{\"action\": \"add_task\", \"title\": \"Design\"}\n");
    assert_eq!(lines[1]["saved"], true);
}
