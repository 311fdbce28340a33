//! The persisted resource configuration document.
//!
//! `filters.include` is the single source of truth for which directories are
//! configured. Mutations never happen in place: [`add_path`] and
//! [`ResourceConfig::without_path`] return a new document value and the caller
//! decides when to swap it in and persist it.

use serde::{Deserialize, Serialize};

use crate::validator::PathValidator;
use crate::storage::PathProbe;
use crate::{Error, Result};

/// Identifier written into freshly created documents.
pub const DEFAULT_CONFIG_ID: &str = "allviewer-resources";

/// Display label written into freshly created documents.
pub const DEFAULT_CONFIG_NAME: &str = "AllViewer Image Resources";

/// Contents of `resources.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Stable identifier, set once at creation
    pub id: String,
    /// User-editable display label
    pub name: String,
    pub filters: Filters,
}

/// Path filters of a resource configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// Ordered resource directories, no duplicates
    pub include: Vec<String>,
    /// Reserved; carried through load/save untouched
    pub exclude: Vec<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_CONFIG_ID.to_string(),
            name: DEFAULT_CONFIG_NAME.to_string(),
            filters: Filters::default(),
        }
    }
}

impl ResourceConfig {
    /// Included resource paths, in the order they were added.
    pub fn include(&self) -> &[String] {
        &self.filters.include
    }

    /// Whether `path` is already one of the included resources.
    pub fn contains(&self, path: &str) -> bool {
        self.filters.include.iter().any(|p| p == path)
    }

    /// Whether any resource is configured at all.
    pub fn is_empty(&self) -> bool {
        self.filters.include.is_empty()
    }

    /// Check that `path` could be appended, without touching the filesystem.
    ///
    /// Rejects empty input and paths that are already included.
    pub fn check_addable(&self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(Error::EmptyPath);
        }
        if self.contains(path) {
            return Err(Error::DuplicatePath(path.to_string()));
        }
        Ok(())
    }

    /// Return a copy with `path` appended to `include`.
    ///
    /// Does not validate accessibility; use [`add_path`] for the full operation.
    pub fn with_path(&self, path: &str) -> Result<Self> {
        self.check_addable(path)?;
        let mut next = self.clone();
        next.filters.include.push(path.to_string());
        Ok(next)
    }

    /// Return a copy with the first occurrence of `path` removed, or `None`
    /// when `path` is not included (nothing to persist).
    pub fn without_path(&self, path: &str) -> Option<Self> {
        let index = self.filters.include.iter().position(|p| p == path)?;
        let mut next = self.clone();
        next.filters.include.remove(index);
        Some(next)
    }
}

/// Validate `path` and return a document with it appended.
///
/// The duplicate check runs first, so a duplicate never reaches the probe.
/// An inaccessible path is rejected with [`Error::InvalidPath`] and the
/// input document is left as it was.
pub async fn add_path<P: PathProbe>(
    document: &ResourceConfig,
    path: &str,
    validator: &PathValidator<P>,
) -> Result<ResourceConfig> {
    document.check_addable(path)?;

    let check = validator.check(path).await;
    if !check.valid {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: check.error.unwrap_or_else(|| "path is not accessible".to_string()),
        });
    }

    document.with_path(path)
}
