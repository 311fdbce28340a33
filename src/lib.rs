//! AllViewer - resource directory configuration for an image gallery.
//!
//! This library provides the core behind the `av` CLI tool: a persisted
//! set of resource directories, asynchronous validation of every path in
//! that set, and the phase state machine that decides whether the gallery
//! is reachable or the configuration editor must be shown.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod document;
pub mod logging;
pub mod phase;
pub mod reconciler;
pub mod storage;
pub mod validator;
#[cfg(feature = "watch")]
pub mod watcher;

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::document::ResourceConfig;
    use crate::storage::{ConfigStore, DirectoryPicker, PathProbe, ProbeError};
    use crate::{Error, Result};

    /// Test environment with an isolated data directory and a few real
    /// directories to point resources at.
    pub struct TestEnv {
        /// Isolated data storage directory
        pub data_dir: TempDir,
        /// Directory that is always accessible
        pub resource_dir: TempDir,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self {
                data_dir: TempDir::new().unwrap(),
                resource_dir: TempDir::new().unwrap(),
            }
        }

        /// Path of the resources document inside the data directory.
        pub fn resources_file(&self) -> PathBuf {
            self.data_dir.path().join("resources.json")
        }

        /// A resource directory that exists.
        pub fn resource_path(&self) -> &Path {
            self.resource_dir.path()
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Scripted probe: answers from a table, optionally after a per-path delay.
    /// Paths missing from the table are reported as not found.
    #[derive(Default)]
    pub struct FakeProbe {
        answers: HashMap<String, std::result::Result<(), ProbeError>>,
        delays: HashMap<String, Duration>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn valid(mut self, path: &str) -> Self {
            self.answers.insert(path.to_string(), Ok(()));
            self
        }

        pub fn invalid(mut self, path: &str) -> Self {
            self.answers.insert(
                path.to_string(),
                Err(ProbeError::NotADirectory(path.to_string())),
            );
            self
        }

        pub fn failing(mut self, path: &str) -> Self {
            self.answers.insert(
                path.to_string(),
                Err(ProbeError::Capability("backend unavailable".to_string())),
            );
            self
        }

        pub fn delayed(mut self, path: &str, delay: Duration) -> Self {
            self.delays.insert(path.to_string(), delay);
            self
        }

        pub fn call_count(&self, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == path)
                .count()
        }
    }

    impl PathProbe for FakeProbe {
        async fn probe(&self, path: &str) -> std::result::Result<(), ProbeError> {
            self.calls.lock().unwrap().push(path.to_string());
            if let Some(delay) = self.delays.get(path) {
                tokio::time::sleep(*delay).await;
            }
            self.answers
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(ProbeError::NotFound(path.to_string())))
        }
    }

    /// In-memory store recording every save.
    #[derive(Default)]
    pub struct MemoryStore {
        pub document: Mutex<Option<ResourceConfig>>,
        pub saves: Mutex<Vec<ResourceConfig>>,
        pub fail_location: bool,
        pub fail_load: bool,
        pub fail_save: bool,
        pub panic_save: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_document(document: ResourceConfig) -> Self {
            Self {
                document: Mutex::new(Some(document)),
                ..Self::default()
            }
        }

        pub fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }

        pub fn last_saved(&self) -> Option<ResourceConfig> {
            self.saves.lock().unwrap().last().cloned()
        }
    }

    impl ConfigStore for MemoryStore {
        async fn resolve_location(&self) -> Result<PathBuf> {
            if self.fail_location {
                return Err(Error::LocationUnresolved(
                    "no data directory available".to_string(),
                ));
            }
            Ok(PathBuf::from("/memory/resources.json"))
        }

        async fn load(&self) -> Result<ResourceConfig> {
            if self.fail_load {
                return Err(Error::Load("unexpected end of JSON input".to_string()));
            }
            Ok(self.document.lock().unwrap().clone().unwrap_or_default())
        }

        async fn save(&self, document: &ResourceConfig) -> Result<()> {
            if self.fail_save {
                return Err(Error::Save("disk full".to_string()));
            }
            if self.panic_save {
                panic!("storage backend crashed");
            }
            self.saves.lock().unwrap().push(document.clone());
            *self.document.lock().unwrap() = Some(document.clone());
            Ok(())
        }
    }

    /// Picker that returns a fixed answer.
    pub struct FixedPicker(pub Option<String>);

    impl DirectoryPicker for FixedPicker {
        async fn pick_directory(&self) -> Option<String> {
            self.0.clone()
        }
    }
}

/// Library-level error type for AllViewer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Preferences parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Could not resolve the configuration location: {0}")]
    LocationUnresolved(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Failed to save configuration: {0}")]
    Save(String),

    #[error("Path is already configured: {0}")]
    DuplicatePath(String),

    #[error("Path is not usable: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path is empty")]
    EmptyPath,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for AllViewer operations.
pub type Result<T> = std::result::Result<T, Error>;
