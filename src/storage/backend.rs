//! Capability traits consumed by the configuration core.
//!
//! The core never touches the filesystem directly. Everything it needs from
//! the outside world goes through one of these traits:
//! - `ConfigStore` - locate, load and save the resources document
//! - `PathProbe` - decide whether a directory is usable
//! - `DirectoryPicker` - let the user choose a directory

use std::future::Future;
use std::path::PathBuf;

use crate::Result;
use crate::document::ResourceConfig;

/// Reason a path failed its accessibility probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Path does not exist: {0}")]
    NotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Directory is not readable: {0}")]
    Unreadable(String),

    /// The probing backend itself failed (not a verdict on the path).
    #[error("Path check failed: {0}")]
    Capability(String),
}

/// Persistence backend for the resources document.
pub trait ConfigStore: Send + Sync + 'static {
    /// Find where the document lives.
    fn resolve_location(&self) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Load the document. A missing document yields the default one.
    fn load(&self) -> impl Future<Output = Result<ResourceConfig>> + Send;

    /// Replace the persisted document.
    fn save(&self, document: &ResourceConfig) -> impl Future<Output = Result<()>> + Send;
}

/// Accessibility check for a single resource path.
pub trait PathProbe: Send + Sync + 'static {
    fn probe(&self, path: &str) -> impl Future<Output = std::result::Result<(), ProbeError>> + Send;
}

/// Native directory chooser. `None` means the user cancelled.
pub trait DirectoryPicker: Send + Sync + 'static {
    fn pick_directory(&self) -> impl Future<Output = Option<String>> + Send;
}
