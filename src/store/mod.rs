//! The board store: the single authorized path for all canvas mutations.
//!
//! `BoardStore` holds the in-memory `{nodes, edges}` aggregate for the
//! active project plus a cache of per-project states for fast switching.
//! Every content mutation records an undo snapshot (unless explicitly
//! opted out for high-frequency updates) and sets the dirty flag that the
//! persistence bridge watches.
//!
//! Failure semantics: "id not found" is a benign no-op everywhere, because
//! the store must tolerate the UI racing asynchronous deletions. Structural
//! violations (a self-loop edge) fail with a typed validation error.

pub mod history;

pub use history::{History, DEFAULT_HISTORY_LIMIT};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{
    auto_position, new_edge_id, new_node_id, new_subtask_id, next_sort_order, starter_board,
    Board, BoardEdge, Connection, NodeData, NodeDataPatch, Position, Subtask, SubtaskPatch,
    TaskNode,
};
use crate::{Error, Result};

/// Per-project in-memory state.
#[derive(Debug, Clone)]
pub struct ProjectState {
    /// The owning project id
    pub project_id: String,
    /// Current canvas content
    board: Board,
    /// Undo/redo stacks
    history: History,
    /// True iff the board diverges from the last persisted snapshot
    dirty: bool,
    /// Timestamp of the last successful save
    last_saved_at: Option<DateTime<Utc>>,
}

impl ProjectState {
    fn new(project_id: &str, history_limit: usize) -> Self {
        Self {
            project_id: project_id.to_string(),
            board: starter_board(),
            history: History::new(history_limit),
            dirty: false,
            last_saved_at: None,
        }
    }
}

/// In-memory mutation engine for one client session.
///
/// Exactly one project is active at a time; switching projects stashes the
/// current state and swaps in the target's cached state (never a
/// synchronous re-fetch).
#[derive(Debug)]
pub struct BoardStore {
    active: ProjectState,
    cache: HashMap<String, ProjectState>,
    history_limit: usize,
}

impl BoardStore {
    /// Create a store for `project_id` with the default history depth.
    pub fn new(project_id: &str) -> Self {
        Self::with_history_limit(project_id, DEFAULT_HISTORY_LIMIT)
    }

    /// Create a store with an explicit undo-depth cap.
    pub fn with_history_limit(project_id: &str, history_limit: usize) -> Self {
        Self {
            active: ProjectState::new(project_id, history_limit),
            cache: HashMap::new(),
            history_limit,
        }
    }

    // ---- Read surface ----

    pub fn project_id(&self) -> &str {
        &self.active.project_id
    }

    pub fn board(&self) -> &Board {
        &self.active.board
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.active.board.nodes
    }

    pub fn edges(&self) -> &[BoardEdge] {
        &self.active.board.edges
    }

    pub fn node(&self, node_id: &str) -> Option<&TaskNode> {
        self.active.board.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&BoardEdge> {
        self.active.board.edges.iter().find(|e| e.id == edge_id)
    }

    /// Sum of the node's subtask estimates in minutes, or `None` when the
    /// node is missing.
    pub fn estimated_minutes_total(&self, node_id: &str) -> Option<u32> {
        self.node(node_id).map(|n| n.data.estimated_minutes_total())
    }

    pub fn is_dirty(&self) -> bool {
        self.active.dirty
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.active.last_saved_at
    }

    pub fn undo_depth(&self) -> usize {
        self.active.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.active.history.redo_depth()
    }

    // ---- Mutation engine ----

    /// Create a task card and append it to the board. Always succeeds:
    /// defaults absorb missing fields, and the position auto-places when
    /// the caller does not supply one. Returns the new node id.
    pub fn add_task(&mut self, patch: &NodeDataPatch, position: Option<Position>) -> String {
        self.record_history();
        let nodes = &self.active.board.nodes;
        let id = new_node_id(nodes);
        let position = position.unwrap_or_else(|| auto_position(nodes));
        let node = TaskNode {
            id: id.clone(),
            position,
            data: NodeData::from_patch(patch),
        };
        debug!(node_id = %id, title = %node.data.title, "add_task");
        self.active.board.nodes.push(node);
        self.active.dirty = true;
        id
    }

    /// Shallow-merge `patch` into the node's data. Silently no-ops when the
    /// node is missing (optimistic UI racing a deletion).
    ///
    /// `record_history=false` keeps high-frequency updates (a timer ticking
    /// `time_spent_secs` once per second) from flooding the undo stack; the
    /// board is still marked dirty.
    pub fn update_node_data(&mut self, node_id: &str, patch: &NodeDataPatch, record_history: bool) {
        let Some(index) = self.active.board.nodes.iter().position(|n| n.id == node_id) else {
            debug!(node_id = %node_id, "update_node_data: missing node, no-op");
            return;
        };
        if record_history {
            self.record_history();
        }
        patch.apply_to(&mut self.active.board.nodes[index].data);
        self.active.dirty = true;
    }

    /// Reposition a card. Same no-op and history semantics as
    /// `update_node_data`.
    pub fn move_node(&mut self, node_id: &str, position: Position, record_history: bool) {
        let Some(index) = self.active.board.nodes.iter().position(|n| n.id == node_id) else {
            debug!(node_id = %node_id, "move_node: missing node, no-op");
            return;
        };
        if record_history {
            self.record_history();
        }
        self.active.board.nodes[index].position = position;
        self.active.dirty = true;
    }

    /// Remove a node and every edge whose source or target references it.
    /// The whole cascade is one history entry. No-ops when absent.
    pub fn delete_node(&mut self, node_id: &str) {
        if !self.active.board.nodes.iter().any(|n| n.id == node_id) {
            debug!(node_id = %node_id, "delete_node: missing node, no-op");
            return;
        }
        self.record_history();
        let edges_before = self.active.board.edges.len();
        self.active.board.nodes.retain(|n| n.id != node_id);
        self.active
            .board
            .edges
            .retain(|e| e.source != node_id && e.target != node_id);
        debug!(
            node_id = %node_id,
            pruned_edges = edges_before - self.active.board.edges.len(),
            "delete_node"
        );
        self.active.dirty = true;
    }

    /// Append a subtask to the addressed node's list. Returns the new
    /// subtask id, or `None` when the node is missing.
    pub fn add_subtask(
        &mut self,
        node_id: &str,
        title: &str,
        estimated_minutes: u32,
    ) -> Option<String> {
        let index = self.active.board.nodes.iter().position(|n| n.id == node_id)?;
        self.record_history();
        let subtasks = &self.active.board.nodes[index].data.subtasks;
        let id = new_subtask_id(subtasks);
        let sort_order = next_sort_order(subtasks);
        let subtask = Subtask::new(id.clone(), title, estimated_minutes, sort_order);
        debug!(node_id = %node_id, subtask_id = %id, "add_subtask");
        self.active.board.nodes[index].data.subtasks.push(subtask);
        self.active.dirty = true;
        Some(id)
    }

    /// Merge fields into the addressed subtask. No-ops when either id is
    /// missing.
    pub fn update_subtask(&mut self, node_id: &str, subtask_id: &str, patch: &SubtaskPatch) {
        let Some(node_index) = self.active.board.nodes.iter().position(|n| n.id == node_id)
        else {
            debug!(node_id = %node_id, "update_subtask: missing node, no-op");
            return;
        };
        let Some(sub_index) = self.active.board.nodes[node_index]
            .data
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
        else {
            debug!(subtask_id = %subtask_id, "update_subtask: missing subtask, no-op");
            return;
        };
        self.record_history();
        patch.apply_to(&mut self.active.board.nodes[node_index].data.subtasks[sub_index]);
        self.active.dirty = true;
    }

    /// Remove the addressed subtask. No-ops when either id is missing.
    pub fn delete_subtask(&mut self, node_id: &str, subtask_id: &str) {
        let Some(node_index) = self.active.board.nodes.iter().position(|n| n.id == node_id)
        else {
            debug!(node_id = %node_id, "delete_subtask: missing node, no-op");
            return;
        };
        let subtasks = &self.active.board.nodes[node_index].data.subtasks;
        if !subtasks.iter().any(|s| s.id == subtask_id) {
            debug!(subtask_id = %subtask_id, "delete_subtask: missing subtask, no-op");
            return;
        }
        self.record_history();
        self.active.board.nodes[node_index]
            .data
            .subtasks
            .retain(|s| s.id != subtask_id);
        self.active.dirty = true;
    }

    /// Create an edge from a drag-connect gesture.
    ///
    /// A self-loop is a validation error. A missing endpoint silently drops
    /// the connection (the gesture was cancelled mid-air or raced a
    /// deletion) and returns `Ok(None)`.
    pub fn add_edge(&mut self, connection: &Connection) -> Result<Option<String>> {
        if connection.source == connection.target {
            return Err(Error::Validation(format!(
                "edge from {} to itself is not allowed",
                connection.source
            )));
        }
        let nodes = &self.active.board.nodes;
        if !nodes.iter().any(|n| n.id == connection.source)
            || !nodes.iter().any(|n| n.id == connection.target)
        {
            debug!(
                source = %connection.source,
                target = %connection.target,
                "add_edge: missing endpoint, connection dropped"
            );
            return Ok(None);
        }
        self.record_history();
        let id = new_edge_id(&self.active.board.edges);
        debug!(edge_id = %id, source = %connection.source, target = %connection.target, "add_edge");
        self.active.board.edges.push(BoardEdge {
            id: id.clone(),
            source: connection.source.clone(),
            target: connection.target.clone(),
            source_handle: connection.source_handle,
            target_handle: connection.target_handle,
        });
        self.active.dirty = true;
        Ok(Some(id))
    }

    /// Remove an edge by id. No-ops when absent.
    pub fn delete_edge(&mut self, edge_id: &str) {
        if !self.active.board.edges.iter().any(|e| e.id == edge_id) {
            debug!(edge_id = %edge_id, "delete_edge: missing edge, no-op");
            return;
        }
        self.record_history();
        self.active.board.edges.retain(|e| e.id != edge_id);
        self.active.dirty = true;
    }

    /// Replace the board with the documented starter content, dropping both
    /// history stacks.
    pub fn reset_board(&mut self) {
        debug!(project = %self.active.project_id, "reset_board");
        self.active.board = starter_board();
        self.active.history.clear();
        self.active.dirty = true;
    }

    // ---- Undo/redo ----

    /// Restore the most recent undo snapshot. Returns whether anything
    /// changed.
    pub fn undo(&mut self) -> bool {
        let current = self.active.board.clone();
        match self.active.history.undo(current) {
            Some(previous) => {
                self.active.board = previous;
                self.active.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Reapply the most recently undone snapshot. Returns whether anything
    /// changed.
    pub fn redo(&mut self) -> bool {
        let current = self.active.board.clone();
        match self.active.history.redo(current) {
            Some(next) => {
                self.active.board = next;
                self.active.dirty = true;
                true
            }
            None => false,
        }
    }

    // ---- Project switching and the persistence bridge surface ----

    /// Swap the active state for another project's last-known state from
    /// the session cache (or a fresh default board). Never fetches.
    pub fn switch_project(&mut self, project_id: &str) {
        if project_id == self.active.project_id {
            return;
        }
        debug!(from = %self.active.project_id, to = %project_id, "switch_project");
        let next = self
            .cache
            .remove(project_id)
            .unwrap_or_else(|| ProjectState::new(project_id, self.history_limit));
        let previous = std::mem::replace(&mut self.active, next);
        self.cache.insert(previous.project_id.clone(), previous);
    }

    /// Replace the in-memory board wholesale (snapshot load/restore).
    ///
    /// `clean=true` marks the board as matching the persisted snapshot it
    /// came from (latest-snapshot load); `clean=false` marks it dirty
    /// (restore of an arbitrary historical snapshot that diverges from the
    /// latest persisted row). Either way the history stacks are dropped:
    /// undo must not cross a wholesale replacement.
    pub fn replace_board(&mut self, board: Board, clean: bool) {
        self.active.board = board;
        self.active.history.clear();
        self.active.dirty = !clean;
    }

    /// Record a successful save round-trip.
    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.active.dirty = false;
        self.active.last_saved_at = Some(at);
    }

    fn record_history(&mut self) {
        self.active.history.record(self.active.board.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    fn store() -> BoardStore {
        let mut store = BoardStore::new("proj-1");
        // Start from an empty board so node counts are exact.
        store.replace_board(Board::default(), true);
        store
    }

    fn titled(title: &str) -> NodeDataPatch {
        NodeDataPatch {
            title: Some(title.to_string()),
            ..NodeDataPatch::default()
        }
    }

    #[test]
    fn test_add_task_ids_unique() {
        let mut store = store();
        let mut ids = std::collections::HashSet::new();
        for i in 0..64 {
            let id = store.add_task(&titled(&format!("t{}", i)), None);
            assert!(ids.insert(id));
        }
        assert_eq!(store.nodes().len(), 64);
    }

    #[test]
    fn test_add_task_defaults_absorb_missing_fields() {
        let mut store = store();
        let id = store.add_task(&NodeDataPatch::default(), None);
        let node = store.node(&id).unwrap();
        assert_eq!(node.data.title, "Untitled task");
        assert_eq!(node.data.status, TaskStatus::NotStarted);
        assert_eq!(node.data.time_spent_secs, 0);
    }

    #[test]
    fn test_add_task_uses_caller_position() {
        let mut store = store();
        let id = store.add_task(&titled("a"), Some(Position::new(10.0, 20.0)));
        let node = store.node(&id).unwrap();
        assert_eq!(node.position, Position::new(10.0, 20.0));
    }

    #[test]
    fn test_update_node_data_missing_is_noop() {
        let mut store = store();
        store.add_task(&titled("a"), None);
        let before = store.board().clone();

        store.update_node_data("pb-missing", &titled("x"), true);
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_update_without_history_sets_dirty_only() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        store.mark_saved(Utc::now());
        let depth = store.undo_depth();

        let patch = NodeDataPatch {
            time_spent_secs: Some(61),
            ..NodeDataPatch::default()
        };
        store.update_node_data(&id, &patch, false);

        assert_eq!(store.undo_depth(), depth);
        assert!(store.is_dirty());
        assert_eq!(store.node(&id).unwrap().data.time_spent_secs, 61);
    }

    #[test]
    fn test_delete_node_idempotent() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        store.delete_node(&id);
        assert!(store.node(&id).is_none());

        let before = store.board().clone();
        store.delete_node(&id);
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_delete_node_prunes_touching_edges() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let b = store.add_task(&titled("b"), None);
        let c = store.add_task(&titled("c"), None);
        store.add_edge(&connection(&a, &b)).unwrap().unwrap();
        store.add_edge(&connection(&b, &c)).unwrap().unwrap();
        store.add_edge(&connection(&c, &a)).unwrap().unwrap();

        store.delete_node(&b);

        assert_eq!(store.edges().len(), 1);
        assert!(store
            .edges()
            .iter()
            .all(|e| e.source != b && e.target != b));
    }

    #[test]
    fn test_delete_cascade_is_one_history_entry() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let b = store.add_task(&titled("b"), None);
        store.add_edge(&connection(&a, &b)).unwrap().unwrap();
        let before = store.board().clone();
        let depth = store.undo_depth();

        store.delete_node(&a);
        assert_eq!(store.undo_depth(), depth + 1);

        assert!(store.undo());
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_design_build_scenario() {
        let mut store = store();
        let a = store.add_task(&titled("Design"), None);
        let b = store.add_task(&titled("Build"), None);
        store.add_edge(&connection(&a, &b)).unwrap().unwrap();

        store.delete_node(&a);

        assert_eq!(store.nodes().len(), 1);
        assert_eq!(store.nodes()[0].data.title, "Build");
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_subtask_lifecycle_and_aggregate() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        let s1 = store.add_subtask(&id, "research", 120).unwrap();
        let s2 = store.add_subtask(&id, "write up", 180).unwrap();
        assert_ne!(s1, s2);
        assert_eq!(store.estimated_minutes_total(&id), Some(300));

        store.delete_subtask(&id, &s1);
        let node = store.node(&id).unwrap();
        assert_eq!(node.data.subtasks.len(), 1);
        assert_eq!(store.estimated_minutes_total(&id), Some(180));
    }

    #[test]
    fn test_subtask_sort_order_appends() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        store.add_subtask(&id, "first", 0).unwrap();
        store.add_subtask(&id, "second", 0).unwrap();
        let orders: Vec<u32> = store.node(&id).unwrap().data.subtasks.iter().map(|s| s.sort_order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_subtask_ops_missing_ids_noop() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        assert!(store.add_subtask("pb-missing", "x", 0).is_none());

        let before = store.board().clone();
        store.update_subtask(&id, "pbs-missing", &SubtaskPatch::default());
        store.delete_subtask("pb-missing", "pbs-missing");
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_update_subtask_merges_fields() {
        let mut store = store();
        let id = store.add_task(&titled("a"), None);
        let sid = store.add_subtask(&id, "item", 30).unwrap();
        let patch = SubtaskPatch {
            completed: Some(true),
            time_spent_secs: Some(900),
            ..SubtaskPatch::default()
        };
        store.update_subtask(&id, &sid, &patch);
        let subtask = &store.node(&id).unwrap().data.subtasks[0];
        assert!(subtask.completed);
        assert_eq!(subtask.time_spent_secs, 900);
        assert_eq!(subtask.estimated_minutes, 30);
        assert_eq!(subtask.title, "item");
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let result = store.add_edge(&connection(&a, &a));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_edge_with_missing_endpoint_dropped() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let depth = store.undo_depth();

        let result = store.add_edge(&connection(&a, "pb-missing")).unwrap();
        assert!(result.is_none());
        assert!(store.edges().is_empty());
        // A dropped gesture is not a mutation: no history entry.
        assert_eq!(store.undo_depth(), depth);
    }

    #[test]
    fn test_delete_edge_noop_when_absent() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let b = store.add_task(&titled("b"), None);
        store.add_edge(&connection(&a, &b)).unwrap().unwrap();

        let before = store.board().clone();
        store.delete_edge("pbe-missing");
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_undo_restores_pre_mutation_state() {
        let mut store = store();
        store.add_task(&titled("a"), None);
        let before = store.board().clone();

        store.add_task(&titled("b"), None);
        assert!(store.undo());
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut store = store();
        store.add_task(&titled("a"), None);
        store.add_task(&titled("b"), None);
        let after = store.board().clone();

        assert!(store.undo());
        assert!(store.redo());
        assert_eq!(store.board(), &after);
    }

    #[test]
    fn test_mutation_after_undo_clears_redo() {
        let mut store = store();
        store.add_task(&titled("a"), None);
        store.add_task(&titled("b"), None);
        assert!(store.undo());
        assert_eq!(store.redo_depth(), 1);

        store.add_task(&titled("c"), None);
        assert_eq!(store.redo_depth(), 0);
        assert!(!store.redo());
    }

    #[test]
    fn test_history_never_exceeds_limit() {
        let mut store = BoardStore::with_history_limit("proj-1", 5);
        store.replace_board(Board::default(), true);
        for i in 0..40 {
            store.add_task(&titled(&format!("t{}", i)), None);
            assert!(store.undo_depth() <= 5);
        }
        assert_eq!(store.undo_depth(), 5);
    }

    #[test]
    fn test_undo_empty_noop() {
        let mut store = store();
        assert!(!store.undo());
        assert!(!store.redo());
    }

    #[test]
    fn test_reset_board_restores_starter_and_clears_stacks() {
        let mut store = store();
        let a = store.add_task(&titled("a"), None);
        let b = store.add_task(&titled("b"), None);
        store.add_edge(&connection(&a, &b)).unwrap().unwrap();
        store.undo();

        store.reset_board();

        assert_eq!(store.nodes().len(), 1);
        assert_eq!(store.nodes()[0].data.title, "Welcome to your board");
        assert!(store.edges().is_empty());
        assert_eq!(store.undo_depth(), 0);
        assert_eq!(store.redo_depth(), 0);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_dirty_tracking_round_trip() {
        let mut store = store();
        assert!(!store.is_dirty());

        store.add_task(&titled("a"), None);
        assert!(store.is_dirty());

        let now = Utc::now();
        store.mark_saved(now);
        assert!(!store.is_dirty());
        assert_eq!(store.last_saved_at(), Some(now));

        store.undo();
        assert!(store.is_dirty());
    }

    #[test]
    fn test_switch_project_stashes_and_restores_state() {
        let mut store = store();
        let id = store.add_task(&titled("alpha work"), None);

        store.switch_project("proj-2");
        assert_eq!(store.project_id(), "proj-2");
        // Fresh project gets the default starter board.
        assert_eq!(store.nodes().len(), 1);
        assert!(store.node(&id).is_none());

        store.switch_project("proj-1");
        assert_eq!(store.project_id(), "proj-1");
        assert!(store.node(&id).is_some());
    }

    #[test]
    fn test_switch_to_active_project_is_noop() {
        let mut store = store();
        let before = store.board().clone();
        store.switch_project("proj-1");
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn test_replace_board_clean_and_dirty() {
        let mut store = store();
        store.add_task(&titled("a"), None);

        store.replace_board(starter_board(), true);
        assert!(!store.is_dirty());
        assert_eq!(store.undo_depth(), 0);

        store.replace_board(Board::default(), false);
        assert!(store.is_dirty());
    }

    fn connection(source: &str, target: &str) -> Connection {
        Connection {
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
        }
    }
}
