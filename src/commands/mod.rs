//! Command implementations for the pinboard CLI.
//!
//! One-shot commands follow a load/mutate/persist shape: the latest
//! snapshot (of any kind) is loaded into a fresh store, the mutation is
//! applied through the engine, and the result is persisted as a `manual`
//! snapshot. Read commands never write. Undo/redo and autosave live in
//! `pb session`, where in-memory history actually survives between
//! operations.

use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::models::{NodeDataPatch, Position, SubtaskPatch, TaskStatus};
use crate::storage::{SnapshotKind, SnapshotStore};
use crate::store::BoardStore;
use crate::{Error, Result};

/// Everything a command needs besides its own arguments.
pub struct Ctx {
    /// Project the command addresses
    pub project: String,
    /// Loaded user configuration
    pub config: Config,
}

/// A command result, carried in both output formats.
#[derive(Debug)]
pub struct CommandOutput {
    pub json: serde_json::Value,
    pub human: String,
}

impl CommandOutput {
    fn new(json: serde_json::Value, human: impl Into<String>) -> Self {
        Self {
            json,
            human: human.into(),
        }
    }
}

/// Open the snapshot store for the context's backend.
pub fn open_snapshots(ctx: &Ctx) -> Result<SnapshotStore> {
    SnapshotStore::open(ctx.config.backend_type()?, ctx.config.remote_url.as_deref())
}

/// Open the snapshot store and a board store seeded with the latest
/// persisted snapshot. Errors with `NotInitialized` when the project has
/// no storage yet.
pub fn open_store(ctx: &Ctx) -> Result<(BoardStore, SnapshotStore)> {
    let snapshots = open_snapshots(ctx)?;
    snapshots.require_initialized(&ctx.project)?;

    let mut store = BoardStore::with_history_limit(&ctx.project, ctx.config.history_limit);
    if let Some(latest) = snapshots.latest(&ctx.project, None)? {
        store.replace_board(latest.board, true);
    }
    Ok((store, snapshots))
}

/// Persist the board after a one-shot mutation.
fn persist(
    store: &mut BoardStore,
    snapshots: &mut SnapshotStore,
    summary: Option<String>,
) -> Result<String> {
    let id = snapshots.create(
        store.project_id(),
        store.board(),
        SnapshotKind::Manual,
        summary,
    )?;
    store.mark_saved(Utc::now());
    Ok(id)
}

// === System ===

/// Initialize snapshot storage for the project.
pub fn system_init(ctx: &Ctx) -> Result<CommandOutput> {
    let mut snapshots = open_snapshots(ctx)?;
    let created = snapshots.init(&ctx.project)?;
    let human = if created {
        format!("Initialized pinboard storage for '{}'", ctx.project)
    } else {
        format!("Storage for '{}' already initialized", ctx.project)
    };
    Ok(CommandOutput::new(
        json!({"project": ctx.project, "initialized": created, "location": snapshots.location()}),
        human,
    ))
}

/// Show version, build, and storage information.
pub fn system_info(ctx: &Ctx) -> Result<CommandOutput> {
    let snapshots = open_snapshots(ctx)?;
    let json = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build_timestamp": env!("PB_BUILD_TIMESTAMP"),
        "git_commit": env!("PB_GIT_COMMIT"),
        "project": ctx.project,
        "backend": snapshots.backend_type(),
        "location": snapshots.location(),
    });
    let human = format!(
        "pinboard {} ({} @ {})\nproject:  {}\nbackend:  {} at {}",
        env!("CARGO_PKG_VERSION"),
        env!("PB_GIT_COMMIT"),
        env!("PB_BUILD_TIMESTAMP"),
        ctx.project,
        snapshots.backend_type(),
        snapshots.location(),
    );
    Ok(CommandOutput::new(json, human))
}

// === Tasks ===

pub fn task_add(
    ctx: &Ctx,
    title: &str,
    description: Option<String>,
    status: Option<TaskStatus>,
    hours: Option<f64>,
    at: Option<Position>,
) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let patch = NodeDataPatch {
        title: Some(title.to_string()),
        description,
        status,
        estimated_hours: hours,
        ..NodeDataPatch::default()
    };
    let id = store.add_task(&patch, at);
    let node = store
        .node(&id)
        .cloned()
        .ok_or_else(|| Error::NotFound(id.clone()))?;
    persist(&mut store, &mut snapshots, None)?;

    Ok(CommandOutput::new(
        json!({"id": id, "title": node.data.title, "position": node.position}),
        format!("Created task {} ({})", id, node.data.title),
    ))
}

pub fn task_update(
    ctx: &Ctx,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    hours: Option<f64>,
    time_spent_secs: Option<u64>,
) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let patch = NodeDataPatch {
        title,
        description,
        status,
        estimated_hours: hours,
        time_spent_secs,
        ..NodeDataPatch::default()
    };
    let updated = store.node(id).is_some();
    store.update_node_data(id, &patch, true);
    if updated {
        persist(&mut store, &mut snapshots, None)?;
    }

    let human = if updated {
        format!("Updated task {}", id)
    } else {
        format!("Task {} not found; nothing changed", id)
    };
    Ok(CommandOutput::new(json!({"id": id, "updated": updated}), human))
}

pub fn task_move(ctx: &Ctx, id: &str, x: f64, y: f64) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let moved = store.node(id).is_some();
    store.move_node(id, Position::new(x, y), true);
    if moved {
        persist(&mut store, &mut snapshots, None)?;
    }

    let human = if moved {
        format!("Moved task {} to ({}, {})", id, x, y)
    } else {
        format!("Task {} not found; nothing changed", id)
    };
    Ok(CommandOutput::new(json!({"id": id, "moved": moved}), human))
}

pub fn task_delete(ctx: &Ctx, id: &str) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let edges_before = store.edges().len();
    let deleted = store.node(id).is_some();
    store.delete_node(id);
    if deleted {
        persist(&mut store, &mut snapshots, None)?;
    }

    let pruned = edges_before - store.edges().len();
    let human = if deleted {
        format!("Deleted task {} ({} edge(s) pruned)", id, pruned)
    } else {
        format!("Task {} not found; nothing changed", id)
    };
    Ok(CommandOutput::new(
        json!({"id": id, "deleted": deleted, "pruned_edges": pruned}),
        human,
    ))
}

pub fn task_list(ctx: &Ctx) -> Result<CommandOutput> {
    let (store, _) = open_store(ctx)?;
    let rows: Vec<serde_json::Value> = store
        .nodes()
        .iter()
        .map(|n| {
            json!({
                "id": n.id,
                "title": n.data.title,
                "status": n.data.status,
                "subtasks": n.data.subtasks.len(),
                "estimated_minutes_total": n.data.estimated_minutes_total(),
            })
        })
        .collect();

    let mut human = format!("{} task(s)\n", store.nodes().len());
    for node in store.nodes() {
        human.push_str(&format!(
            "  {}  [{}]  {}\n",
            node.id, node.data.status, node.data.title
        ));
    }
    Ok(CommandOutput::new(json!({"tasks": rows}), human.trim_end().to_string()))
}

pub fn task_show(ctx: &Ctx, id: &str) -> Result<CommandOutput> {
    let (store, _) = open_store(ctx)?;
    let node = store
        .node(id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;

    let mut human = format!(
        "{}  [{}]  {}\n  position: ({}, {})\n  estimate: {}h, spent {}s",
        node.id,
        node.data.status,
        node.data.title,
        node.position.x,
        node.position.y,
        node.data.estimated_hours,
        node.data.time_spent_secs,
    );
    if !node.data.subtasks.is_empty() {
        human.push_str(&format!(
            "\n  subtasks ({} min total):",
            node.data.estimated_minutes_total()
        ));
        for subtask in &node.data.subtasks {
            human.push_str(&format!(
                "\n    [{}] {}  {} ({} min)",
                if subtask.completed { "x" } else { " " },
                subtask.id,
                subtask.title,
                subtask.estimated_minutes,
            ));
        }
    }
    Ok(CommandOutput::new(serde_json::to_value(node)?, human))
}

// === Subtasks ===

pub fn subtask_add(
    ctx: &Ctx,
    node_id: &str,
    title: &str,
    minutes: Option<u32>,
) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    match store.add_subtask(node_id, title, minutes.unwrap_or(0)) {
        Some(subtask_id) => {
            persist(&mut store, &mut snapshots, None)?;
            Ok(CommandOutput::new(
                json!({"node_id": node_id, "subtask_id": subtask_id}),
                format!("Added subtask {} to {}", subtask_id, node_id),
            ))
        }
        None => Ok(CommandOutput::new(
            json!({"node_id": node_id, "subtask_id": null}),
            format!("Task {} not found; nothing changed", node_id),
        )),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn subtask_update(
    ctx: &Ctx,
    node_id: &str,
    subtask_id: &str,
    title: Option<String>,
    completed: Option<bool>,
    minutes: Option<u32>,
    time_spent_secs: Option<u64>,
    sort_order: Option<u32>,
) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let patch = SubtaskPatch {
        title,
        completed,
        estimated_minutes: minutes,
        time_spent_secs,
        sort_order,
    };
    let updated = store
        .node(node_id)
        .is_some_and(|n| n.data.subtasks.iter().any(|s| s.id == subtask_id));
    store.update_subtask(node_id, subtask_id, &patch);
    if updated {
        persist(&mut store, &mut snapshots, None)?;
    }

    let human = if updated {
        format!("Updated subtask {} on {}", subtask_id, node_id)
    } else {
        format!("Subtask {}/{} not found; nothing changed", node_id, subtask_id)
    };
    Ok(CommandOutput::new(
        json!({"node_id": node_id, "subtask_id": subtask_id, "updated": updated}),
        human,
    ))
}

pub fn subtask_delete(ctx: &Ctx, node_id: &str, subtask_id: &str) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let deleted = store
        .node(node_id)
        .is_some_and(|n| n.data.subtasks.iter().any(|s| s.id == subtask_id));
    store.delete_subtask(node_id, subtask_id);
    if deleted {
        persist(&mut store, &mut snapshots, None)?;
    }

    let human = if deleted {
        format!("Deleted subtask {} from {}", subtask_id, node_id)
    } else {
        format!("Subtask {}/{} not found; nothing changed", node_id, subtask_id)
    };
    Ok(CommandOutput::new(
        json!({"node_id": node_id, "subtask_id": subtask_id, "deleted": deleted}),
        human,
    ))
}

// === Links ===

pub fn link_add(
    ctx: &Ctx,
    source: &str,
    target: &str,
    from_side: Option<crate::models::HandleSide>,
    to_side: Option<crate::models::HandleSide>,
) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let connection = crate::models::Connection {
        source: source.to_string(),
        target: target.to_string(),
        source_handle: from_side,
        target_handle: to_side,
    };
    match store.add_edge(&connection)? {
        Some(edge_id) => {
            persist(&mut store, &mut snapshots, None)?;
            Ok(CommandOutput::new(
                json!({"edge_id": edge_id, "source": source, "target": target}),
                format!("Connected {} -> {} ({})", source, target, edge_id),
            ))
        }
        None => Ok(CommandOutput::new(
            json!({"edge_id": null, "dropped": true}),
            format!(
                "Connection {} -> {} dropped: missing endpoint",
                source, target
            ),
        )),
    }
}

pub fn link_delete(ctx: &Ctx, id: &str) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let deleted = store.edge(id).is_some();
    store.delete_edge(id);
    if deleted {
        persist(&mut store, &mut snapshots, None)?;
    }

    let human = if deleted {
        format!("Deleted edge {}", id)
    } else {
        format!("Edge {} not found; nothing changed", id)
    };
    Ok(CommandOutput::new(json!({"id": id, "deleted": deleted}), human))
}

pub fn link_list(ctx: &Ctx) -> Result<CommandOutput> {
    let (store, _) = open_store(ctx)?;
    let rows: Vec<serde_json::Value> = store
        .edges()
        .iter()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();

    let mut human = format!("{} edge(s)\n", store.edges().len());
    for edge in store.edges() {
        human.push_str(&format!("  {}  {} -> {}\n", edge.id, edge.source, edge.target));
    }
    Ok(CommandOutput::new(
        json!({"edges": rows}),
        human.trim_end().to_string(),
    ))
}

// === Board ===

pub fn board_show(ctx: &Ctx) -> Result<CommandOutput> {
    let (store, _) = open_store(ctx)?;
    let human = format!(
        "board '{}': {} task(s), {} edge(s)",
        ctx.project,
        store.nodes().len(),
        store.edges().len(),
    );
    Ok(CommandOutput::new(serde_json::to_value(store.board())?, human))
}

pub fn board_reset(ctx: &Ctx) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    store.reset_board();
    persist(&mut store, &mut snapshots, Some("board reset".to_string()))?;
    Ok(CommandOutput::new(
        json!({"project": ctx.project, "reset": true}),
        format!("Reset board '{}' to starter content", ctx.project),
    ))
}

// === Snapshots ===

pub fn save(ctx: &Ctx, summary: Option<String>) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let id = persist(&mut store, &mut snapshots, summary)?;
    Ok(CommandOutput::new(
        json!({"snapshot_id": id, "kind": SnapshotKind::Manual}),
        format!("Saved snapshot {}", id),
    ))
}

pub fn snapshot_list(
    ctx: &Ctx,
    limit: usize,
    kind: Option<SnapshotKind>,
) -> Result<CommandOutput> {
    let snapshots = open_snapshots(ctx)?;
    snapshots.require_initialized(&ctx.project)?;
    let metas = snapshots.list(&ctx.project, limit, kind)?;

    let mut human = format!("{} snapshot(s)\n", metas.len());
    for meta in &metas {
        human.push_str(&format!(
            "  {}  {}  {}  {}\n",
            meta.id,
            meta.kind,
            meta.created_at.format("%Y-%m-%d %H:%M:%S"),
            meta.summary.as_deref().unwrap_or("-"),
        ));
    }
    Ok(CommandOutput::new(
        serde_json::to_value(&metas)?,
        human.trim_end().to_string(),
    ))
}

pub fn snapshot_show(ctx: &Ctx, id: &str) -> Result<CommandOutput> {
    let snapshots = open_snapshots(ctx)?;
    snapshots.require_initialized(&ctx.project)?;
    let record = snapshots.get(&ctx.project, id)?;
    let human = format!(
        "{}  {}  {} task(s), {} edge(s)",
        record.id,
        record.kind,
        record.board.nodes.len(),
        record.board.edges.len(),
    );
    Ok(CommandOutput::new(serde_json::to_value(&record)?, human))
}

/// Replace the board with a historical snapshot.
///
/// The restored board diverges from the latest persisted row, so it is
/// immediately re-saved as a new manual snapshot; the historical row
/// itself is never rewritten.
pub fn snapshot_restore(ctx: &Ctx, id: &str) -> Result<CommandOutput> {
    let (mut store, mut snapshots) = open_store(ctx)?;
    let record = snapshots.restore(&ctx.project, id)?;
    store.replace_board(record.board, false);
    let new_id = persist(
        &mut store,
        &mut snapshots,
        Some(format!("restored from {}", id)),
    )?;
    Ok(CommandOutput::new(
        json!({"restored_from": id, "snapshot_id": new_id}),
        format!("Restored board from {} (saved as {})", id, new_id),
    ))
}
