//! Common test utilities for pinboard integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/pinboard/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates a temporary data directory and an empty config
/// file, wired in per-invocation via `PB_DATA_DIR` and `PB_CONFIG` so
/// tests are parallel-safe and hermetic against the user's real config.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        let data_dir = TempDir::new().unwrap();
        // An empty config file resolves every key to its default.
        std::fs::write(data_dir.path().join("config.toml"), "").unwrap();
        Self { data_dir }
    }

    /// Create a new test environment and initialize the default project.
    pub fn init() -> Self {
        let env = Self::new();
        env.pb().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the pb binary with isolated data directory.
    pub fn pb(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pb"));
        cmd.env("PB_DATA_DIR", self.data_dir.path());
        cmd.env("PB_CONFIG", self.data_dir.path().join("config.toml"));
        cmd.env("PB_ACTION_LOG", "0");
        cmd
    }

    /// Run a pb command and parse its JSON stdout.
    pub fn pb_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.pb().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "pb {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
