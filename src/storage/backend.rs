//! Snapshot backend trait and the in-memory implementation.
//!
//! This module provides the persistence seam for board snapshots:
//! - `FileBackend` - JSONL files under the local data directory (default)
//! - `HttpBackend` - a remote snapshot API over HTTP
//! - `MemoryBackend` - in-process storage, used by tests and throwaway runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::SnapshotRecord;
use crate::{Error, Result};

/// Trait for backends that persist and retrieve snapshot records.
///
/// Records are append-only; there is no update or delete. `read_all`
/// returns records in creation order (oldest first).
pub trait SnapshotBackend: Send + Sync {
    /// Prepare storage for a project.
    fn init(&mut self, project_id: &str) -> Result<()>;

    /// Check whether storage exists for a project.
    fn exists(&self, project_id: &str) -> Result<bool>;

    /// Append one snapshot record.
    fn append(&mut self, record: &SnapshotRecord) -> Result<()>;

    /// Read all records for a project, oldest first.
    fn read_all(&self, project_id: &str) -> Result<Vec<SnapshotRecord>>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Available snapshot backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Local JSONL storage (default) - ~/.local/share/pinboard/<project-hash>/
    File,
    /// Remote snapshot API over HTTP
    Http,
    /// In-process storage, gone when the process exits
    Memory,
}

impl BackendType {
    /// Parse a backend type from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" | "local" | "default" => Some(Self::File),
            "http" | "remote" => Some(Self::Http),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Http => "http",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-process backend. Keeps a save-call counter and a failure toggle so
/// bridge tests can observe autosave behavior without touching disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: HashMap<String, Vec<SnapshotRecord>>,
    initialized: Vec<String>,
    save_calls: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the save-call counter; stays valid after the backend is
    /// boxed into a store.
    pub fn save_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.save_calls)
    }

    /// Handle on the failure toggle: while set, every `append` fails.
    pub fn failure_toggle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_saves)
    }
}

impl SnapshotBackend for MemoryBackend {
    fn init(&mut self, project_id: &str) -> Result<()> {
        if !self.initialized.iter().any(|p| p == project_id) {
            self.initialized.push(project_id.to_string());
            self.records.entry(project_id.to_string()).or_default();
        }
        Ok(())
    }

    fn exists(&self, project_id: &str) -> Result<bool> {
        Ok(self.initialized.iter().any(|p| p == project_id))
    }

    fn append(&mut self, record: &SnapshotRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other(
                "memory backend: simulated save failure",
            )));
        }
        self.records
            .entry(record.project_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn read_all(&self, project_id: &str) -> Result<Vec<SnapshotRecord>> {
        Ok(self.records.get(project_id).cloned().unwrap_or_default())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
