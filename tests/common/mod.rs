//! Common test utilities for AllViewer integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/allviewer/` directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data, preferences, and resources.
///
/// The `av()` method returns a `Command` that sets `AV_DATA_DIR` and
/// `AV_CONFIG_DIR` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub config_dir: TempDir,
    /// Holds real directories to configure as resources
    pub resource_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
            resource_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the av binary with isolated directories.
    ///
    /// Debouncing is disabled so `check` answers immediately.
    pub fn av(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_av"));
        cmd.env("AV_DATA_DIR", self.data_dir.path());
        cmd.env("AV_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("AV_RESOURCES_FILE");
        cmd.env_remove("AV_DEBOUNCE_MS");
        cmd.env_remove("AV_LOG");
        cmd.env_remove("RUST_LOG");
        cmd.args(["--debounce-ms", "0"]);
        cmd
    }

    /// Create a named resource directory and return its path as a string.
    pub fn resource(&self, name: &str) -> String {
        let path = self.resource_dir.path().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    /// A path under the resource directory that does not exist.
    pub fn missing(&self, name: &str) -> String {
        self.resource_dir
            .path()
            .join(name)
            .to_string_lossy()
            .to_string()
    }

    pub fn resources_file(&self) -> PathBuf {
        self.data_dir.path().join("resources.json")
    }

    pub fn config_path(&self) -> &Path {
        self.config_dir.path()
    }

    /// Parse the persisted resources document.
    pub fn document(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(self.resources_file()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// Included paths of the persisted document.
    pub fn included(&self) -> Vec<String> {
        self.document()["filters"]["include"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the JSON object printed on stdout.
pub fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).unwrap()
}
