//! Interactive stdin session: the event loop where in-memory history and
//! the autosave timer actually live.
//!
//! One command per line, one JSON result per line on stdout:
//! - free text containing a JSON directive (`{"action": "add_task", ...}`)
//!   is parsed, validated, applied, and immediately persisted as an
//!   `ai_generated` snapshot
//! - `save [summary]` persists a manual snapshot
//! - `undo` / `redo` move through the in-memory history
//! - `tick <node-id> [secs]` adds time spent without touching the undo
//!   stack (the timer path)
//! - `project <id>` switches the active project (cached state, no fetch)
//! - `show` prints the current board
//! - `reset` replaces the board with the starter content
//! - `quit` / `exit` (or EOF) ends the session
//!
//! Between commands the autosave tick runs; when it attempts a save, an
//! `{"autosave": ...}` line reports the outcome. On exit a dirty board is
//! flushed with one final manual save so no edits are silently lost.

use std::io::{BufRead, Write};

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::autosave::{save_board, Autosaver};
use crate::commands::{self, Ctx};
use crate::directive;
use crate::storage::{SnapshotKind, SnapshotStore};
use crate::store::BoardStore;
use crate::{Error, Result};

/// Run a session over the context's configured backend.
pub fn run(ctx: &Ctx, autosave_secs: Option<u64>) -> Result<()> {
    let (store, snapshots) = commands::open_store(ctx)?;
    let interval = autosave_secs.unwrap_or(ctx.config.autosave_interval_secs);
    let autosaver = Autosaver::new(interval, Utc::now());

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_loop(store, snapshots, autosaver, stdin.lock(), stdout.lock())
}

/// The session loop, parameterized over I/O and storage for testing.
pub fn run_loop(
    mut store: BoardStore,
    mut snapshots: SnapshotStore,
    mut autosaver: Autosaver,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    let project = store.project_id().to_string();
    info!(project = %project, "session started");
    emit(
        &mut output,
        &json!({"session": "ready", "project": project}),
    )?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (word, rest) = split_word(trimmed);
        let done = match word {
            "quit" | "exit" => true,
            "undo" => {
                let applied = store.undo();
                emit(&mut output, &json!({"action": "undo", "applied": applied}))?;
                false
            }
            "redo" => {
                let applied = store.redo();
                emit(&mut output, &json!({"action": "redo", "applied": applied}))?;
                false
            }
            "show" => {
                emit(&mut output, &serde_json::to_value(store.board())?)?;
                false
            }
            "reset" => {
                store.reset_board();
                emit(&mut output, &json!({"action": "reset", "applied": true}))?;
                false
            }
            "tick" => {
                handle_tick(rest, &mut store, &mut output)?;
                false
            }
            "project" => {
                if rest.is_empty() {
                    emit(&mut output, &json!({"error": "project requires an id"}))?;
                } else {
                    store.switch_project(rest);
                    emit(&mut output, &json!({"action": "project", "project": rest}))?;
                }
                false
            }
            "save" => {
                let summary = if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_string())
                };
                let outcome = save_board(
                    Utc::now(),
                    &mut store,
                    &mut snapshots,
                    SnapshotKind::Manual,
                    summary,
                );
                emit(&mut output, &json!({"action": "save", "outcome": outcome}))?;
                false
            }
            _ => {
                handle_directive(trimmed, &mut store, &mut snapshots, &mut output)?;
                false
            }
        };
        if done {
            break;
        }

        if let Some(outcome) = autosaver.tick(Utc::now(), &mut store, &mut snapshots) {
            emit(&mut output, &json!({"autosave": outcome}))?;
        }
    }

    // Flush pending edits instead of dropping them with the session.
    if store.is_dirty() {
        let outcome = save_board(
            Utc::now(),
            &mut store,
            &mut snapshots,
            SnapshotKind::Manual,
            Some("session end".to_string()),
        );
        emit(&mut output, &json!({"action": "flush", "outcome": outcome}))?;
    }
    info!(project = %project, "session ended");
    Ok(())
}

/// Parse, apply, and persist one directive line. Directive problems are
/// reported on the protocol stream and never end the session.
fn handle_directive(
    line: &str,
    store: &mut BoardStore,
    snapshots: &mut SnapshotStore,
    output: &mut impl Write,
) -> Result<()> {
    let applied = directive::parse(line).and_then(|d| directive::apply(&d, store));
    match applied {
        Ok(applied) => {
            let outcome = save_board(
                Utc::now(),
                store,
                snapshots,
                SnapshotKind::AiGenerated,
                Some(format!("ai: {}", applied.action)),
            );
            emit(
                output,
                &json!({"applied": applied, "saved": outcome.saved}),
            )?;
        }
        Err(Error::InvalidInput(msg)) | Err(Error::Validation(msg)) => {
            emit(output, &json!({"error": msg}))?;
        }
        Err(Error::InvalidId(msg)) => {
            emit(output, &json!({"error": format!("invalid id: {}", msg)}))?;
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

/// Add time spent to a card without recording history: the once-per-second
/// timer path must not flood the undo stack, but still dirties the board
/// for the next autosave.
fn handle_tick(rest: &str, store: &mut BoardStore, output: &mut impl Write) -> Result<()> {
    let (id, secs) = split_word(rest);
    if id.is_empty() {
        return emit(output, &json!({"error": "tick requires a node id"}));
    }
    let secs: u64 = if secs.is_empty() {
        1
    } else {
        match secs.parse() {
            Ok(secs) => secs,
            Err(_) => {
                return emit(output, &json!({"error": format!("invalid seconds: {}", secs)}));
            }
        }
    };

    match store.node(id) {
        Some(node) => {
            let total = node.data.time_spent_secs + secs;
            let patch = crate::models::NodeDataPatch {
                time_spent_secs: Some(total),
                ..crate::models::NodeDataPatch::default()
            };
            store.update_node_data(id, &patch, false);
            emit(
                output,
                &json!({"action": "tick", "id": id, "time_spent_secs": total}),
            )
        }
        None => emit(output, &json!({"action": "tick", "id": id, "applied": false})),
    }
}

fn split_word(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    }
}

fn emit(output: &mut impl Write, value: &serde_json::Value) -> Result<()> {
    writeln!(output, "{}", value)?;
    Ok(())
}
