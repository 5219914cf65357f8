//! Action logging for pinboard commands.
//!
//! Every `pb` invocation appends one structured JSONL entry describing the
//! command, its outcome, and its duration. Logging never fails a command:
//! errors degrade to a stderr warning and the command result stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// A single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Project the command addressed
    pub project: String,

    /// Command name (e.g., "task add", "save", "session")
    pub command: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

/// Append an action to the log file.
///
/// Disabled when `PB_ACTION_LOG` is set to `0`, `false`, or `no`. The log
/// path defaults to `<data dir>/action.log`; `PB_ACTION_LOG_PATH`
/// overrides it.
pub fn log_action(
    project: &str,
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    if !enabled() {
        return;
    }

    let path = match log_path() {
        Some(path) => path,
        None => {
            eprintln!("Warning: Failed to determine action log path");
            return;
        }
    };

    let entry = ActionLog {
        timestamp: Utc::now(),
        project: project.to_string(),
        command: command.to_string(),
        args: sanitize_args(&args),
        success,
        error,
        duration_ms,
        user: current_user(),
    };

    if let Err(err) = write_entry(&path, &entry) {
        eprintln!("Warning: Failed to write action log: {}", err);
    }
}

fn enabled() -> bool {
    match std::env::var("PB_ACTION_LOG") {
        Ok(value) => !matches!(value.to_lowercase().as_str(), "0" | "false" | "no"),
        Err(_) => true,
    }
}

fn log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PB_ACTION_LOG_PATH") {
        return Some(PathBuf::from(path));
    }
    crate::storage::data_dir().ok().map(|dir| dir.join("action.log"))
}

fn write_entry(path: &PathBuf, entry: &ActionLog) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Redact sensitive keys and keep entries small.
fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("token")
                    || key_lower.contains("password")
                    || key_lower.contains("secret")
                {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_args(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > 10 {
                serde_json::Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
            }
        }
        serde_json::Value::String(s) => {
            if s.len() > 100 {
                let prefix: String = s.chars().take(97).collect();
                serde_json::Value::String(format!("{}... ({} chars)", prefix, s.len()))
            } else {
                args.clone()
            }
        }
        _ => args.clone(),
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
