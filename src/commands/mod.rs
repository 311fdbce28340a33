//! Command implementations for the `av` CLI.
//!
//! Every command drives the same [`Controller`] the gallery front end would
//! use: bootstrap, wait for the first reconciliation, dispatch the user's
//! action, wait again, then report from the resulting state.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{ResolvedSettings, config_file_path};
use crate::controller::Controller;
use crate::phase::{AppState, Event, Phase};
use crate::storage::{FileStore, FsProbe, PromptPicker, default_resources_file};
use crate::validator::PathCheck;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Controller wired to the real filesystem.
pub type FsController = Controller<FileStore, FsProbe, PromptPicker>;

/// Build a controller from resolved preferences.
pub fn open_controller(settings: &ResolvedSettings) -> FsController {
    let store = match settings.resources_file() {
        Some(path) => FileStore::at(path),
        None => FileStore::new(),
    };
    Controller::new(store, FsProbe, PromptPicker).with_debounce(settings.debounce())
}

fn mark(valid: bool) -> &'static str {
    if valid { "ok" } else { "!!" }
}

/// Overall configuration state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub phase: Phase,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub gallery_visible: bool,
    pub editor_open: bool,
    pub paths: Vec<PathCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AppState> for StatusReport {
    fn from(state: &AppState) -> Self {
        Self {
            phase: state.phase,
            valid: state.status.valid,
            message: state.status.message.clone(),
            config_path: state.config_path.clone(),
            gallery_visible: state.gallery_visible,
            editor_open: state.editor_open,
            paths: state.status.checks.clone(),
            error: state.error.clone(),
        }
    }
}

impl Output for StatusReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Phase: {}", self.phase),
            format!("Status: {}", self.message),
        ];
        if let Some(path) = &self.config_path {
            lines.push(format!("Config: {}", path.display()));
        }
        for check in &self.paths {
            lines.push(format!("  [{}] {}", mark(check.valid), check.path));
        }
        if let Some(error) = &self.error {
            lines.push(format!("Warning: {}", error));
        }
        lines.join("\n")
    }
}

/// Configured paths with their accessibility.
#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub count: usize,
    pub paths: Vec<PathCheck>,
}

impl Output for ListReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.paths.is_empty() {
            return "No resources configured.".to_string();
        }
        self.paths
            .iter()
            .map(|check| match &check.error {
                Some(error) => format!("[{}] {} ({})", mark(check.valid), check.path, error),
                None => format!("[{}] {}", mark(check.valid), check.path),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of an add or remove.
#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub action: &'static str,
    pub path: String,
    pub changed: bool,
    pub include: Vec<String>,
    pub phase: Phase,
    pub valid: bool,
    pub message: String,
    /// Whether the current document reached the store
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl MutationReport {
    fn new(action: &'static str, path: String, changed: bool, state: &AppState) -> Self {
        Self {
            action,
            path,
            changed,
            include: state.document.filters.include.clone(),
            phase: state.phase,
            valid: state.status.valid,
            message: state.status.message.clone(),
            saved: state.saved_revision == Some(state.revision),
            warning: state.error.clone().or_else(|| state.notice.clone()),
        }
    }
}

impl Output for MutationReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let verb = match (self.action, self.changed) {
            ("add", true) => "Added",
            ("remove", true) => "Removed",
            _ => "Unchanged",
        };
        let mut out = format!(
            "{} {}\n{} resource path(s) configured; {}",
            verb,
            self.path,
            self.include.len(),
            self.message
        );
        if let Some(warning) = &self.warning {
            out.push_str(&format!("\nWarning: {}", warning));
        }
        out
    }
}

/// Validation of a typed path.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub path: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Output for CheckReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match &self.error {
            Some(error) => format!("{}: invalid ({})", self.path, error),
            None if self.valid => format!("{}: valid", self.path),
            None => format!("{}: invalid", self.path),
        }
    }
}

/// Resolved preferences.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigShowReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub resources_file: PathBuf,
    pub settings: ResolvedSettings,
}

impl Output for ConfigShowReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let resources_source = self
            .settings
            .resources_file
            .as_ref()
            .map(|r| r.source.to_string())
            .unwrap_or_else(|| "default".to_string());
        let mut lines = Vec::new();
        if let Some(file) = &self.config_file {
            lines.push(format!("config file:    {}", file.display()));
        }
        lines.push(format!(
            "resources-file: {} ({})",
            self.resources_file.display(),
            resources_source
        ));
        lines.push(format!(
            "debounce-ms:    {} ({})",
            self.settings.debounce_ms.value, self.settings.debounce_ms.source
        ));
        lines.push(format!(
            "watch:          {} ({})",
            self.settings.watch.value, self.settings.watch.source
        ));
        lines.join("\n")
    }
}

/// `av status`
pub async fn status(settings: &ResolvedSettings) -> Result<StatusReport> {
    let mut controller = open_controller(settings);
    controller.start().await;
    Ok(StatusReport::from(controller.state()))
}

/// `av list`
pub async fn list(settings: &ResolvedSettings) -> Result<ListReport> {
    let mut controller = open_controller(settings);
    controller.start().await;
    let paths = controller.state().status.checks.clone();
    Ok(ListReport {
        count: paths.len(),
        paths,
    })
}

/// `av add <path>`
pub async fn add(settings: &ResolvedSettings, path: &Path) -> Result<MutationReport> {
    let absolute = std::path::absolute(path)?;
    let path = absolute.to_string_lossy().to_string();

    let mut controller = open_controller(settings);
    controller.start().await;
    controller.dispatch(Event::AddPath(path.clone()));
    controller.settle().await;

    let state = controller.state();
    if let Some(error) = &state.add_error {
        return Err(Error::Other(error.clone()));
    }
    Ok(MutationReport::new("add", path, true, state))
}

/// `av browse`
pub async fn browse(settings: &ResolvedSettings) -> Result<MutationReport> {
    let mut controller = open_controller(settings);
    controller.start().await;
    let before = controller.state().revision;

    controller.dispatch(Event::Browse);
    controller.settle().await;

    let state = controller.state();
    if let Some(error) = &state.add_error {
        return Err(Error::Other(error.clone()));
    }
    let path = if state.revision != before {
        state.document.include().last().cloned().unwrap_or_default()
    } else {
        String::new()
    };
    Ok(MutationReport::new("add", path, state.revision != before, state))
}

/// `av remove <path>`
pub async fn remove(settings: &ResolvedSettings, path: &str) -> Result<MutationReport> {
    let mut controller = open_controller(settings);
    controller.start().await;
    let before = controller.state().revision;

    controller.dispatch(Event::RemovePath(path.to_string()));
    controller.settle().await;

    let state = controller.state();
    Ok(MutationReport::new(
        "remove",
        path.to_string(),
        state.revision != before,
        state,
    ))
}

/// `av check <path>` - runs the debounced input validation once.
pub async fn check(settings: &ResolvedSettings, text: &str) -> Result<CheckReport> {
    let mut controller = open_controller(settings);
    controller.dispatch(Event::InputChanged(text.to_string()));
    controller.settle().await;

    let input = &controller.state().pending_input;
    Ok(CheckReport {
        path: input.text.clone(),
        valid: input.is_valid,
        error: input.error.clone(),
    })
}

/// `av config show`
pub fn config_show(settings: &ResolvedSettings) -> Result<ConfigShowReport> {
    let resources_file = match settings.resources_file() {
        Some(path) => path.clone(),
        None => default_resources_file()?,
    };
    Ok(ConfigShowReport {
        config_file: config_file_path(),
        resources_file,
        settings: settings.clone(),
    })
}

/// `av watch` - print a line whenever the phase or status changes, until Ctrl+C.
pub async fn watch(settings: &ResolvedSettings, monitor_fs: bool, human: bool) -> Result<StatusReport> {
    let mut controller = open_controller(settings);
    let handle = controller.handle();

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
        }
        shutdown.shutdown();
    });
    // let the interrupt listener install itself before anything is printed
    tokio::task::yield_now().await;

    controller.start().await;
    let initial = StatusReport::from(controller.state());
    emit(&initial, human);

    let mut updates = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = (initial.phase, initial.valid, initial.message.clone());
        while updates.changed().await.is_ok() {
            let report = StatusReport::from(&*updates.borrow_and_update());
            let key = (report.phase, report.valid, report.message.clone());
            if key != last {
                emit(&report, human);
                last = key;
            }
        }
    });

    if monitor_fs && settings.watch() {
        spawn_fs_watcher(&controller);
    }

    let state = controller.run().await;
    printer.abort();
    Ok(StatusReport::from(&state))
}

#[cfg(feature = "watch")]
fn spawn_fs_watcher(controller: &FsController) {
    let handle = controller.handle();
    let validator = controller.validator().clone();
    tokio::spawn(async move {
        if let Err(e) = crate::watcher::watch_resources(handle.clone(), validator).await {
            tracing::warn!(error = %e, "resource watcher stopped");
            let _ = handle.signal(crate::phase::Signal::ConfigError(e.to_string()));
        }
    });
}

#[cfg(not(feature = "watch"))]
fn spawn_fs_watcher(_controller: &FsController) {
    tracing::warn!("built without the `watch` feature; filesystem changes are not monitored");
}

fn emit(result: &impl Output, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolved, ValueSource};
    use crate::test_utils::TestEnv;
    use std::time::Duration;

    fn settings_for(env: &TestEnv) -> ResolvedSettings {
        ResolvedSettings {
            debounce_ms: Resolved::new(0, ValueSource::CliFlag),
            resources_file: Some(Resolved::new(env.resources_file(), ValueSource::CliFlag)),
            watch: Resolved::new(false, ValueSource::CliFlag),
        }
    }

    #[tokio::test]
    async fn test_status_fresh_install() {
        let env = TestEnv::new();
        let report = status(&settings_for(&env)).await.unwrap();
        assert_eq!(report.phase, Phase::NeedsConfiguration);
        assert!(!report.valid);
        assert!(env.resources_file().exists());
    }

    #[tokio::test]
    async fn test_add_then_status_configured() {
        let env = TestEnv::new();
        let settings = settings_for(&env);

        let report = add(&settings, env.resource_path()).await.unwrap();
        assert!(report.changed);
        assert!(report.saved);
        assert_eq!(report.phase, Phase::Configured);

        let status = status(&settings).await.unwrap();
        assert_eq!(status.phase, Phase::Configured);
        assert!(status.gallery_visible);
    }

    #[tokio::test]
    async fn test_add_missing_directory_fails() {
        let env = TestEnv::new();
        let missing = env.resource_path().join("nope");
        let err = add(&settings_for(&env), &missing).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_add_duplicate_fails() {
        let env = TestEnv::new();
        let settings = settings_for(&env);
        add(&settings, env.resource_path()).await.unwrap();
        let err = add(&settings, env.resource_path()).await.unwrap_err();
        assert!(err.to_string().contains("already configured"));
    }

    #[tokio::test]
    async fn test_remove_unknown_path_unchanged() {
        let env = TestEnv::new();
        let report = remove(&settings_for(&env), "/not/configured").await.unwrap();
        assert!(!report.changed);
        assert!(report.warning.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_check_reports_validity() {
        let env = TestEnv::new();
        let settings = settings_for(&env);
        let good = env.resource_path().to_string_lossy().to_string();
        assert!(check(&settings, &good).await.unwrap().valid);

        let bad = check(&settings, "/definitely/not/here").await.unwrap();
        assert!(!bad.valid);
        assert!(bad.error.is_some());

        assert!(check(&settings, "").await.unwrap().valid);
    }

    #[test]
    fn test_status_report_human() {
        let mut state = AppState::new();
        state.phase = Phase::Configured;
        state.status.message = "All 1 resource path(s) are accessible".to_string();
        state.status.checks = vec![PathCheck::ok("/photos")];
        let human = StatusReport::from(&state).to_human();
        assert!(human.contains("Phase: configured"));
        assert!(human.contains("[ok] /photos"));
    }

    #[test]
    fn test_settings_debounce_zero() {
        let env = TestEnv::new();
        assert_eq!(settings_for(&env).debounce(), Duration::ZERO);
    }
}
