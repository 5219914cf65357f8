//! Configuration for pinboard.
//!
//! User preferences live in a single TOML file:
//!
//! - System: `~/.config/pinboard/config.toml`
//! - Override the file location with `PB_CONFIG`
//!
//! Contains:
//! - `autosave_interval_secs` - Seconds between autosave checks
//! - `history_limit` - Maximum undo depth
//! - `backend` - Snapshot backend ("file", "http", or "memory")
//! - `remote_url` - Base URL for the http backend
//! - `output_format` - "json" or "human"
//!
//! Precedence for effective settings: CLI flag > environment > config
//! file > built-in defaults. A missing file yields the defaults; a file
//! that fails to parse is an error rather than a silent fallback.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::autosave::DEFAULT_AUTOSAVE_INTERVAL_SECS;
use crate::storage::BackendType;
use crate::store::DEFAULT_HISTORY_LIMIT;
use crate::{Error, Result};

/// Default command output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// User preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between autosave checks
    pub autosave_interval_secs: u64,

    /// Maximum undo depth
    pub history_limit: usize,

    /// Snapshot backend name
    pub backend: String,

    /// Base URL for the http backend
    pub remote_url: Option<String>,

    /// Default output format
    pub output_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            backend: "file".to_string(),
            remote_url: None,
            output_format: OutputFormat::default(),
        }
    }
}

impl Config {
    /// The default config file location.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("pinboard").join("config.toml"))
    }

    /// Load configuration: `PB_CONFIG` path override, else the default
    /// location, else built-in defaults when no file exists.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("PB_CONFIG") {
            return Self::load_from(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Parse the configured backend name.
    pub fn backend_type(&self) -> Result<BackendType> {
        BackendType::from_str(&self.backend)
            .ok_or_else(|| Error::InvalidInput(format!("unknown backend: {}", self.backend)))
    }
}
