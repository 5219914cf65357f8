//! Bounded undo/redo history over board snapshots.
//!
//! Entries are owned deep copies of the `{nodes, edges}` aggregate captured
//! before a mutation is applied. The timeline is linear: recording a new
//! entry clears the redo stack.

use std::collections::VecDeque;

use crate::models::Board;

/// Default maximum undo depth.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Two-stack undo/redo manager.
///
/// Snapshots are never aliased with live state: callers hand in owned
/// clones, and restored boards are moved back out by value.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Board>,
    redo: Vec<Board>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the pre-mutation state. Evicts the oldest entry once the
    /// configured limit is exceeded and clears the redo stack.
    pub fn record(&mut self, before: Board) {
        self.undo.push_back(before);
        if self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Pop the most recent snapshot, stashing `current` for redo.
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Board) -> Option<Board> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Pop the most recently undone snapshot, stashing `current` for undo.
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&mut self, current: Board) -> Option<Board> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        if self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        Some(next)
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
