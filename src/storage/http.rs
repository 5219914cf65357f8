//! Remote snapshot backend over HTTP.
//!
//! Speaks a small JSON surface:
//! - `POST {base}/projects/{id}/snapshots` - append one snapshot record
//! - `GET  {base}/projects/{id}/snapshots` - all records, oldest first
//!
//! The remote service owns provisioning and retention; failures surface as
//! `Error::Http` and are handled at the persistence bridge (logged,
//! retried on the next autosave tick), never as a crash.

use super::backend::SnapshotBackend;
use super::SnapshotRecord;
use crate::Result;

/// Snapshot backend backed by a remote HTTP API.
pub struct HttpBackend {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpBackend {
    /// Create a backend against the given base URL (no trailing slash).
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::agent(),
        }
    }

    fn snapshots_url(&self, project_id: &str) -> String {
        format!("{}/projects/{}/snapshots", self.base_url, project_id)
    }
}

impl SnapshotBackend for HttpBackend {
    /// The remote service provisions projects on first write; nothing to
    /// do locally.
    fn init(&mut self, _project_id: &str) -> Result<()> {
        Ok(())
    }

    fn exists(&self, project_id: &str) -> Result<bool> {
        match self.agent.get(&self.snapshots_url(project_id)).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn append(&mut self, record: &SnapshotRecord) -> Result<()> {
        self.agent
            .post(&self.snapshots_url(&record.project_id))
            .send_json(record)?;
        Ok(())
    }

    fn read_all(&self, project_id: &str) -> Result<Vec<SnapshotRecord>> {
        let records: Vec<SnapshotRecord> = self
            .agent
            .get(&self.snapshots_url(project_id))
            .call()?
            .into_json()?;
        Ok(records)
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }

    fn backend_type(&self) -> &'static str {
        "http"
    }
}
