//! Preferences for AllViewer.
//!
//! Preferences are separate from the resources document: they describe how
//! the tool behaves, not which directories are configured.
//!
//! ## config.kdl
//!
//! Located at `~/.config/allviewer/config.kdl` (or `$AV_CONFIG_DIR/config.kdl`).
//!
//! Contains:
//! - `debounce-ms` - quiet period before typed paths are validated (default 500)
//! - `resources-file` - explicit location of `resources.json`
//! - `watch` - whether `av watch` monitors configured directories
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    DEBOUNCE_MS_ENV, RESOURCES_FILE_ENV, Resolved, ResolvedSettings, SettingsOverrides,
    ValueSource, resolve_settings, resolve_settings_with,
};
pub use schema::Settings;

use std::fs;
use std::path::PathBuf;

use kdl::KdlDocument;

use crate::{Error, Result};

/// Environment variable overriding the preferences directory.
pub const CONFIG_DIR_ENV: &str = "AV_CONFIG_DIR";

/// Path of config.kdl, if a config directory can be determined.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join("config.kdl"));
        }
    }
    dirs::config_dir().map(|d| d.join("allviewer").join("config.kdl"))
}

/// Load config.kdl. A missing file yields empty settings.
pub fn load_settings() -> Result<Settings> {
    let Some(path) = config_file_path() else {
        return Ok(Settings::default());
    };
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(&path)?;
    let doc: KdlDocument = content.parse()?;
    let settings = Settings::from_kdl(&doc);
    settings
        .validate()
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(file = %path.display(), "loaded preferences");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_load_settings_missing_file() {
        let dir = TempDir::new().unwrap();
        // SAFETY: serialized test, no other thread reads the environment meanwhile
        unsafe { std::env::set_var(CONFIG_DIR_ENV, dir.path()) };
        let settings = load_settings().unwrap();
        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };
        assert_eq!(settings, Settings::default());
    }

    #[test]
    #[serial]
    fn test_load_settings_from_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.kdl"), "debounce-ms 120\n").unwrap();
        // SAFETY: serialized test, no other thread reads the environment meanwhile
        unsafe { std::env::set_var(CONFIG_DIR_ENV, dir.path()) };
        let settings = load_settings();
        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };
        assert_eq!(settings.unwrap().debounce_ms, Some(120));
    }
}
