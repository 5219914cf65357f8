//! Snapshot persistence for board state.
//!
//! Snapshots are immutable copies of the full `{nodes, edges}` aggregate,
//! tagged by how they were produced (manual / autosave / ai_generated).
//!
//! ## Backends
//!
//! - **File backend** (default): JSONL storage at
//!   `~/.local/share/pinboard/<project-hash>/` (override with `PB_DATA_DIR`)
//! - **HTTP backend**: a remote snapshot API
//! - **Memory backend**: in-process, for tests and throwaway runs
//!
//! There is no optimistic-concurrency check on the persisted rows: two
//! sessions editing the same project can overwrite each other's autosaves.
//! That is an accepted limitation of the snapshot model, not a bug.

pub mod backend;
pub mod http;

pub use backend::{BackendType, MemoryBackend, SnapshotBackend};
pub use http::HttpBackend;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::models::Board;
use crate::{Error, Result};

/// How a snapshot was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Explicit user-triggered save
    Manual,
    /// Timer-driven save of a dirty board
    Autosave,
    /// Save applied after an AI directive
    AiGenerated,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotKind::Manual => "manual",
            SnapshotKind::Autosave => "autosave",
            SnapshotKind::AiGenerated => "ai_generated",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SnapshotKind::Manual),
            "autosave" => Ok(SnapshotKind::Autosave),
            "ai_generated" => Ok(SnapshotKind::AiGenerated),
            _ => Err(format!("Unknown snapshot kind: {}", s)),
        }
    }
}

/// One persisted snapshot row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unique identifier (e.g., "snap-a1b2c3d4")
    pub id: String,

    /// Owning project
    pub project_id: String,

    /// How the snapshot was produced
    pub kind: SnapshotKind,

    /// Optional human summary ("before restructure", …)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// The serialized board payload
    pub board: Board,
}

/// Listing row: everything except the board payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: String,
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<&SnapshotRecord> for SnapshotMeta {
    fn from(record: &SnapshotRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind,
            created_at: record.created_at,
            summary: record.summary.clone(),
        }
    }
}

/// Resolve the base data directory.
///
/// Priority: `PB_DATA_DIR` env var > XDG local data dir.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PB_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let base = dirs::data_local_dir().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine data directory",
        ))
    })?;
    Ok(base.join("pinboard"))
}

/// Stable directory name for a project: first 16 hex chars of the
/// project id's SHA-256.
pub fn project_hash(project_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

fn new_snapshot_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("snap-{}", &hex[..8])
}

/// Local JSONL snapshot backend.
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Backend rooted at the resolved data directory.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_dir: data_dir()?,
        })
    }

    /// Backend rooted at an explicit directory (dependency injection for
    /// tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.base_dir.join(project_hash(project_id))
    }

    fn snapshots_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("snapshots.jsonl")
    }
}

impl SnapshotBackend for FileBackend {
    fn init(&mut self, project_id: &str) -> Result<()> {
        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir)?;

        // Keep the raw project id next to the hashed directory name.
        fs::write(dir.join("project"), project_id)?;

        let path = self.snapshots_path(project_id);
        if !path.exists() {
            File::create(&path)?;
        }
        Ok(())
    }

    fn exists(&self, project_id: &str) -> Result<bool> {
        Ok(self.snapshots_path(project_id).exists())
    }

    fn append(&mut self, record: &SnapshotRecord) -> Result<()> {
        let path = self.snapshots_path(&record.project_id);
        if !path.exists() {
            return Err(Error::NotInitialized);
        }
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn read_all(&self, project_id: &str) -> Result<Vec<SnapshotRecord>> {
        let path = self.snapshots_path(project_id);
        if !path.exists() {
            return Err(Error::NotInitialized);
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    fn location(&self) -> String {
        self.base_dir.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

/// Snapshot store: the persistence API consumed by the bridge and the CLI.
pub struct SnapshotStore {
    backend: Box<dyn SnapshotBackend>,
}

impl SnapshotStore {
    /// Open a store over the configured backend type.
    pub fn open(backend_type: BackendType, remote_url: Option<&str>) -> Result<Self> {
        let backend: Box<dyn SnapshotBackend> = match backend_type {
            BackendType::File => Box::new(FileBackend::new()?),
            BackendType::Http => {
                let url = remote_url.ok_or_else(|| {
                    Error::InvalidInput(
                        "http backend requires remote_url in the config".to_string(),
                    )
                })?;
                Box::new(HttpBackend::new(url))
            }
            BackendType::Memory => Box::new(MemoryBackend::new()),
        };
        Ok(Self { backend })
    }

    /// Open over an explicit backend (dependency injection).
    pub fn with_backend(backend: Box<dyn SnapshotBackend>) -> Self {
        Self { backend }
    }

    /// Initialize storage for a project. Returns false when storage
    /// already existed.
    pub fn init(&mut self, project_id: &str) -> Result<bool> {
        if self.backend.exists(project_id)? {
            return Ok(false);
        }
        self.backend.init(project_id)?;
        Ok(true)
    }

    pub fn exists(&self, project_id: &str) -> Result<bool> {
        self.backend.exists(project_id)
    }

    /// Error with `NotInitialized` unless storage exists for the project.
    pub fn require_initialized(&self, project_id: &str) -> Result<()> {
        if self.backend.exists(project_id)? {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Persist one snapshot of the board. Returns the new snapshot id.
    pub fn create(
        &mut self,
        project_id: &str,
        board: &Board,
        kind: SnapshotKind,
        summary: Option<String>,
    ) -> Result<String> {
        let record = SnapshotRecord {
            id: new_snapshot_id(),
            project_id: project_id.to_string(),
            kind,
            summary,
            created_at: Utc::now(),
            board: board.clone(),
        };
        self.backend.append(&record)?;
        info!(
            project = %project_id,
            snapshot = %record.id,
            kind = %kind,
            nodes = record.board.nodes.len(),
            edges = record.board.edges.len(),
            "snapshot created"
        );
        Ok(record.id)
    }

    /// List snapshots, newest first, optionally filtered by kind.
    /// `limit = 0` means no limit.
    pub fn list(
        &self,
        project_id: &str,
        limit: usize,
        kind: Option<SnapshotKind>,
    ) -> Result<Vec<SnapshotMeta>> {
        let records = self.backend.read_all(project_id)?;
        let metas = records
            .iter()
            .rev()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .map(SnapshotMeta::from)
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect();
        Ok(metas)
    }

    /// Fetch one snapshot by id.
    pub fn get(&self, project_id: &str, snapshot_id: &str) -> Result<SnapshotRecord> {
        self.backend
            .read_all(project_id)?
            .into_iter()
            .find(|r| r.id == snapshot_id)
            .ok_or_else(|| Error::NotFound(snapshot_id.to_string()))
    }

    /// The most recent snapshot, optionally filtered by kind.
    pub fn latest(
        &self,
        project_id: &str,
        kind: Option<SnapshotKind>,
    ) -> Result<Option<SnapshotRecord>> {
        Ok(self
            .backend
            .read_all(project_id)?
            .into_iter()
            .rev()
            .find(|r| kind.is_none_or(|k| r.kind == k)))
    }

    /// Fetch-and-log restore of a historical snapshot. Does not mutate
    /// persisted state; the caller decides what to do with the board.
    pub fn restore(&self, project_id: &str, snapshot_id: &str) -> Result<SnapshotRecord> {
        let record = self.get(project_id, snapshot_id)?;
        info!(
            project = %project_id,
            snapshot = %snapshot_id,
            kind = %record.kind,
            "snapshot restored"
        );
        Ok(record)
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::starter_board;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_project_hash_stable_and_distinct() {
        assert_eq!(project_hash("alpha"), project_hash("alpha"));
        assert_ne!(project_hash("alpha"), project_hash("beta"));
        assert_eq!(project_hash("alpha").len(), 16);
    }

    #[test]
    fn test_snapshot_kind_round_trip() {
        for kind in [
            SnapshotKind::Manual,
            SnapshotKind::Autosave,
            SnapshotKind::AiGenerated,
        ] {
            let parsed: SnapshotKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("weekly".parse::<SnapshotKind>().is_err());
    }

    #[test]
    fn test_file_backend_requires_init() {
        let env = TestEnv::new();
        let backend = env.file_backend();
        assert!(!backend.exists("proj").unwrap());
        assert!(matches!(
            backend.read_all("proj"),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_init_idempotent() {
        let env = TestEnv::new();
        let mut store = SnapshotStore::with_backend(Box::new(env.file_backend()));
        assert!(store.init("proj").unwrap());
        assert!(!store.init("proj").unwrap());
        assert!(store.exists("proj").unwrap());
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let env = TestEnv::new();
        let mut store = env.snapshot_store("proj");
        let board = starter_board();

        let id = store
            .create("proj", &board, SnapshotKind::Manual, Some("first".to_string()))
            .unwrap();

        let record = store.get("proj", &id).unwrap();
        assert_eq!(record.board, board);
        assert_eq!(record.kind, SnapshotKind::Manual);
        assert_eq!(record.summary.as_deref(), Some("first"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let env = TestEnv::new();
        let store = env.snapshot_store("proj");
        assert!(matches!(
            store.get("proj", "snap-missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_newest_first_with_kind_filter() {
        let env = TestEnv::new();
        let mut store = env.snapshot_store("proj");
        let board = starter_board();

        let a = store.create("proj", &board, SnapshotKind::Manual, None).unwrap();
        let b = store.create("proj", &board, SnapshotKind::Autosave, None).unwrap();
        let c = store.create("proj", &board, SnapshotKind::Manual, None).unwrap();

        let all = store.list("proj", 0, None).unwrap();
        assert_eq!(
            all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec![c.as_str(), b.as_str(), a.as_str()]
        );

        let manual = store.list("proj", 0, Some(SnapshotKind::Manual)).unwrap();
        assert_eq!(manual.len(), 2);
        assert!(manual.iter().all(|m| m.kind == SnapshotKind::Manual));

        let limited = store.list("proj", 1, None).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, c);
    }

    #[test]
    fn test_latest_respects_kind() {
        let env = TestEnv::new();
        let mut store = env.snapshot_store("proj");
        let board = starter_board();

        assert!(store.latest("proj", None).unwrap().is_none());

        let a = store.create("proj", &board, SnapshotKind::Manual, None).unwrap();
        let b = store.create("proj", &board, SnapshotKind::Autosave, None).unwrap();

        assert_eq!(store.latest("proj", None).unwrap().unwrap().id, b);
        assert_eq!(
            store
                .latest("proj", Some(SnapshotKind::Manual))
                .unwrap()
                .unwrap()
                .id,
            a
        );
    }

    #[test]
    fn test_restore_returns_record_without_mutation() {
        let env = TestEnv::new();
        let mut store = env.snapshot_store("proj");
        let board = starter_board();
        let id = store.create("proj", &board, SnapshotKind::Manual, None).unwrap();

        let restored = store.restore("proj", &id).unwrap();
        assert_eq!(restored.board, board);

        // Restore is fetch-and-log: the row count is unchanged.
        assert_eq!(store.list("proj", 0, None).unwrap().len(), 1);
    }

    #[test]
    fn test_memory_backend_counts_saves() {
        let backend = MemoryBackend::new();
        let counter = backend.save_counter();
        let mut store = SnapshotStore::with_backend(Box::new(backend));
        store.init("proj").unwrap();

        store
            .create("proj", &starter_board(), SnapshotKind::Autosave, None)
            .unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_projects_are_isolated() {
        let env = TestEnv::new();
        let mut store = SnapshotStore::with_backend(Box::new(env.file_backend()));
        store.init("alpha").unwrap();
        store.init("beta").unwrap();

        store
            .create("alpha", &starter_board(), SnapshotKind::Manual, None)
            .unwrap();

        assert_eq!(store.list("alpha", 0, None).unwrap().len(), 1);
        assert!(store.list("beta", 0, None).unwrap().is_empty());
    }
}
