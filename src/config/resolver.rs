//! Precedence resolution for preferences.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`AV_DEBOUNCE_MS`, `AV_RESOURCES_FILE`)
//! 3. `config.kdl`
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Settings, load_settings};
use crate::validator::DEFAULT_DEBOUNCE_MS;
use crate::{Error, Result};

/// Environment variable overriding the debounce period.
pub const DEBOUNCE_MS_ENV: &str = "AV_DEBOUNCE_MS";

/// Environment variable overriding the resources document location.
pub const RESOURCES_FILE_ENV: &str = "AV_RESOURCES_FILE";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for preference resolution.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub debounce_ms: Option<u64>,
    pub resources_file: Option<PathBuf>,
    pub watch: Option<bool>,
}

/// Fully resolved preferences with source tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSettings {
    pub debounce_ms: Resolved<u64>,
    /// `None` means the data directory default
    pub resources_file: Option<Resolved<PathBuf>>,
    pub watch: Resolved<bool>,
}

impl ResolvedSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.value)
    }

    pub fn resources_file(&self) -> Option<&PathBuf> {
        self.resources_file.as_ref().map(|r| &r.value)
    }

    pub fn watch(&self) -> bool {
        self.watch.value
    }
}

/// Resolve preferences from the real environment and config.kdl.
pub fn resolve_settings(overrides: &SettingsOverrides) -> Result<ResolvedSettings> {
    let file = load_settings()?;
    resolve_settings_with(overrides, |name| std::env::var(name).ok(), &file)
}

/// Resolve preferences from explicit sources.
pub fn resolve_settings_with(
    overrides: &SettingsOverrides,
    env: impl Fn(&str) -> Option<String>,
    file: &Settings,
) -> Result<ResolvedSettings> {
    let env_debounce = match env(DEBOUNCE_MS_ENV).filter(|v| !v.is_empty()) {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            Error::InvalidInput(format!("{} must be an integer, got {:?}", DEBOUNCE_MS_ENV, raw))
        })?),
        None => None,
    };

    let debounce_ms = if let Some(ms) = overrides.debounce_ms {
        Resolved::new(ms, ValueSource::CliFlag)
    } else if let Some(ms) = env_debounce {
        Resolved::new(ms, ValueSource::EnvVar(DEBOUNCE_MS_ENV.to_string()))
    } else if let Some(ms) = file.debounce_ms {
        Resolved::new(ms, ValueSource::ConfigFile)
    } else {
        Resolved::new(DEFAULT_DEBOUNCE_MS, ValueSource::Default)
    };

    Settings {
        debounce_ms: Some(debounce_ms.value),
        ..Settings::default()
    }
    .validate()
    .map_err(Error::InvalidInput)?;

    let resources_file = if let Some(path) = &overrides.resources_file {
        Some(Resolved::new(path.clone(), ValueSource::CliFlag))
    } else if let Some(path) = env(RESOURCES_FILE_ENV).filter(|v| !v.is_empty()) {
        Some(Resolved::new(
            PathBuf::from(path),
            ValueSource::EnvVar(RESOURCES_FILE_ENV.to_string()),
        ))
    } else {
        file.resources_file
            .as_ref()
            .map(|path| Resolved::new(path.clone(), ValueSource::ConfigFile))
    };

    let watch = if let Some(watch) = overrides.watch {
        Resolved::new(watch, ValueSource::CliFlag)
    } else if let Some(watch) = file.watch {
        Resolved::new(watch, ValueSource::ConfigFile)
    } else {
        Resolved::new(true, ValueSource::Default)
    };

    Ok(ResolvedSettings {
        debounce_ms,
        resources_file,
        watch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(
            ValueSource::EnvVar("AV_DEBOUNCE_MS".to_string()).to_string(),
            "env:AV_DEBOUNCE_MS"
        );
        assert_eq!(ValueSource::ConfigFile.to_string(), "config");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    #[test]
    fn test_defaults() {
        let resolved =
            resolve_settings_with(&SettingsOverrides::default(), env_from(&[]), &Settings::new())
                .unwrap();
        assert_eq!(resolved.debounce_ms.value, DEFAULT_DEBOUNCE_MS);
        assert_eq!(resolved.debounce_ms.source, ValueSource::Default);
        assert!(resolved.resources_file.is_none());
        assert!(resolved.watch());
    }

    #[test]
    fn test_file_over_default() {
        let file = Settings {
            debounce_ms: Some(200),
            resources_file: Some(PathBuf::from("/from/file.json")),
            watch: Some(false),
        };
        let resolved =
            resolve_settings_with(&SettingsOverrides::default(), env_from(&[]), &file).unwrap();
        assert_eq!(resolved.debounce_ms, Resolved::new(200, ValueSource::ConfigFile));
        assert_eq!(
            resolved.resources_file(),
            Some(&PathBuf::from("/from/file.json"))
        );
        assert!(!resolved.watch());
    }

    #[test]
    fn test_env_over_file() {
        let file = Settings {
            debounce_ms: Some(200),
            ..Settings::default()
        };
        let env = env_from(&[
            (DEBOUNCE_MS_ENV, "50"),
            (RESOURCES_FILE_ENV, "/from/env.json"),
        ]);
        let resolved = resolve_settings_with(&SettingsOverrides::default(), env, &file).unwrap();
        assert_eq!(resolved.debounce_ms.value, 50);
        assert_eq!(
            resolved.debounce_ms.source,
            ValueSource::EnvVar(DEBOUNCE_MS_ENV.to_string())
        );
        assert_eq!(
            resolved.resources_file(),
            Some(&PathBuf::from("/from/env.json"))
        );
    }

    #[test]
    fn test_cli_over_env() {
        let overrides = SettingsOverrides {
            debounce_ms: Some(0),
            resources_file: Some(PathBuf::from("/from/cli.json")),
            watch: Some(false),
        };
        let env = env_from(&[(DEBOUNCE_MS_ENV, "50")]);
        let resolved = resolve_settings_with(&overrides, env, &Settings::new()).unwrap();
        assert_eq!(resolved.debounce_ms, Resolved::new(0, ValueSource::CliFlag));
        assert_eq!(resolved.debounce(), Duration::ZERO);
        assert_eq!(
            resolved.resources_file.unwrap().source,
            ValueSource::CliFlag
        );
        assert_eq!(resolved.watch.source, ValueSource::CliFlag);
    }

    #[test]
    fn test_bad_env_value_is_error() {
        let env = env_from(&[(DEBOUNCE_MS_ENV, "soon")]);
        let err =
            resolve_settings_with(&SettingsOverrides::default(), env, &Settings::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_out_of_range_cli_value_is_error() {
        let overrides = SettingsOverrides {
            debounce_ms: Some(60_000),
            ..SettingsOverrides::default()
        };
        assert!(resolve_settings_with(&overrides, env_from(&[]), &Settings::new()).is_err());
    }
}
