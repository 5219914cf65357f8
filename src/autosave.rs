//! Dirty-tracked autosave: the timer half of the persistence bridge.
//!
//! The store is single-threaded and event-driven, so the "timer" is a
//! tick: the owning loop calls [`Autosaver::tick`] with the current time
//! between events, and the autosaver decides whether a save is due. A tick
//! with a clean board makes no backend call at all.
//!
//! Save failures never corrupt in-memory state: the dirty flag stays set,
//! the failure is logged and reported as a boolean outcome, and the next
//! due tick retries.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::storage::{SnapshotKind, SnapshotStore};
use crate::store::BoardStore;

/// Default seconds between autosave checks.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 120;

/// Result of one save attempt, shaped for callers that only need
/// success/failure plus context.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// Whether the snapshot was persisted
    pub saved: bool,

    /// How the save was produced
    pub kind: SnapshotKind,

    /// Snapshot id on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,

    /// Failure description on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Interval gate for timer-driven saves.
#[derive(Debug, Clone)]
pub struct Autosaver {
    interval: Duration,
    last_tick: DateTime<Utc>,
}

impl Autosaver {
    /// Create an autosaver that first fires one interval after `start`.
    pub fn new(interval_secs: u64, start: DateTime<Utc>) -> Self {
        Self {
            interval: Duration::seconds(interval_secs.max(1) as i64),
            last_tick: start,
        }
    }

    /// Whether enough time has passed since the last tick.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_tick >= self.interval
    }

    /// Run one autosave check.
    ///
    /// Returns `None` when the interval has not elapsed or the board is
    /// clean (no backend call is made in either case); otherwise the
    /// outcome of the save attempt.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        store: &mut BoardStore,
        snapshots: &mut SnapshotStore,
    ) -> Option<SaveOutcome> {
        if !self.due(now) {
            return None;
        }
        self.last_tick = now;
        if !store.is_dirty() {
            return None;
        }
        Some(save_board(now, store, snapshots, SnapshotKind::Autosave, None))
    }
}

/// Persist the current board and settle the dirty flag.
///
/// The payload reflects board state as of serialization time; the shared
/// save path for manual, autosave, and AI-triggered snapshots.
pub fn save_board(
    now: DateTime<Utc>,
    store: &mut BoardStore,
    snapshots: &mut SnapshotStore,
    kind: SnapshotKind,
    summary: Option<String>,
) -> SaveOutcome {
    match snapshots.create(store.project_id(), store.board(), kind, summary) {
        Ok(snapshot_id) => {
            store.mark_saved(now);
            SaveOutcome {
                saved: true,
                kind,
                snapshot_id: Some(snapshot_id),
                error: None,
            }
        }
        Err(err) => {
            // Keep the dirty flag set so the next due tick retries.
            warn!(project = %store.project_id(), kind = %kind, error = %err, "save failed");
            SaveOutcome {
                saved: false,
                kind,
                snapshot_id: None,
                error: Some(err.to_string()),
            }
        }
    }
}
