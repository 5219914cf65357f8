//! Pinboard - a project-planning canvas store.
//!
//! This library provides the core functionality for the `pb` CLI tool:
//! an in-memory board of task cards connected by edges, with field-level
//! mutations, bounded undo/redo history, and snapshot persistence with
//! dirty-tracked autosave.

pub mod action_log;
pub mod autosave;
pub mod cli;
pub mod commands;
pub mod config;
pub mod directive;
pub mod models;
pub mod session;
pub mod storage;
pub mod store;


/// Library-level error type for pinboard operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Not initialized: run `pb system init` first")]
    NotInitialized,

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

/// Result type alias for pinboard operations.
pub type Result<T> = std::result::Result<T, Error>;
