//! Storage layer for AllViewer data.
//!
//! The resources document is a pretty-printed JSON file named
//! `resources.json`, stored under the platform data directory:
//!
//! - Linux: `~/.local/share/allviewer/resources.json`
//! - macOS: `~/Library/Application Support/allviewer/resources.json`
//!
//! `AV_DATA_DIR` replaces the data directory (used by tests). When the
//! platform has no data directory, the directory of the running executable
//! is used instead.

pub mod backend;

pub use backend::{ConfigStore, DirectoryPicker, PathProbe, ProbeError};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::document::ResourceConfig;
use crate::{Error, Result};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "AV_DATA_DIR";

/// File name of the resources document.
pub const RESOURCES_FILE_NAME: &str = "resources.json";

/// Get the data directory for AllViewer.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("allviewer"));
    }

    let exe = std::env::current_exe().map_err(|e| {
        Error::LocationUnresolved(format!("no data directory and no executable path: {}", e))
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        Error::LocationUnresolved("executable has no parent directory".to_string())
    })
}

/// Default location of `resources.json`.
pub fn default_resources_file() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(RESOURCES_FILE_NAME))
}

/// JSON file backed [`ConfigStore`].
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    /// Explicit document path; the data directory default is used when unset
    path: Option<PathBuf>,
}

impl FileStore {
    /// Store at the default location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn location(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_resources_file(),
        }
    }

    /// Create the parent directory and a default document if nothing is there yet.
    async fn ensure_exists(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await.unwrap_or(false) {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Load(format!(
                        "could not create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                tracing::info!(dir = %parent.display(), "created data directory");
            }
        }

        if !fs::try_exists(path).await.unwrap_or(false) {
            Self::write_document(path, &ResourceConfig::default())
                .await
                .map_err(|e| Error::Load(e.to_string()))?;
            tracing::info!(file = %path.display(), "created default resources document");
        }

        Ok(())
    }

    /// Write through a sibling temp file so a crash never leaves half a document.
    async fn write_document(path: &Path, document: &ResourceConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    async fn resolve_location(&self) -> Result<PathBuf> {
        self.location()
    }

    async fn load(&self) -> Result<ResourceConfig> {
        let path = self.location()?;
        Self::ensure_exists(&path).await?;

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Load(format!("could not read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Load(format!("{} is not a valid document: {}", path.display(), e)))
    }

    async fn save(&self, document: &ResourceConfig) -> Result<()> {
        let path = self.location().map_err(|e| Error::Save(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Save(e.to_string()))?;
            }
        }
        Self::write_document(&path, document)
            .await
            .map_err(|e| Error::Save(format!("could not write {}: {}", path.display(), e)))
    }
}

/// Filesystem [`PathProbe`]: the path must exist, be a directory, and be listable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    async fn probe(&self, path: &str) -> std::result::Result<(), ProbeError> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProbeError::NotFound(path.to_string()));
            }
            Err(e) => return Err(ProbeError::Unreadable(format!("{}: {}", path, e))),
        };

        if !metadata.is_dir() {
            return Err(ProbeError::NotADirectory(path.to_string()));
        }

        fs::read_dir(path)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::Unreadable(format!("{}: {}", path, e)))
    }
}

/// Terminal stand-in for a native folder dialog: reads one line from stdin.
/// An empty line cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptPicker;

impl DirectoryPicker for PromptPicker {
    async fn pick_directory(&self) -> Option<String> {
        let answer = tokio::task::spawn_blocking(|| {
            eprint!("Directory to add (empty to cancel): ");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok()?;
            let line = line.trim().to_string();
            if line.is_empty() { None } else { Some(line) }
        })
        .await;

        match answer {
            Ok(choice) => choice,
            Err(e) => {
                tracing::warn!(error = %e, "directory prompt failed");
                None
            }
        }
    }
}
