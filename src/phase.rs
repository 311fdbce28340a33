//! Application phase state machine.
//!
//! All UI-facing state lives in one [`AppState`] value. [`AppState::apply`]
//! consumes an [`Event`], updates the state, and returns the [`Effect`]s
//! the runtime must carry out. Effects report back as further events, so
//! every transition stays a plain function of (state, event) and can be
//! tested without a runtime.
//!
//! ```text
//! Bootstrapping --location--> Initializing --reconciled--> Configured
//!       |                          |                           ^  |
//!       | location failed          | load failed / invalid     |  | invalidated
//!       v                          v                           |  v
//!       +------------------> NeedsConfiguration <--------------+--+
//! ```
//!
//! Two tokens protect against stale async results:
//! - `revision` increments whenever the document is replaced; reconciliations
//!   for an older revision are dropped.
//! - `signal_epoch` increments whenever the environment pushes a status
//!   signal; a reconciliation that started before the latest signal still
//!   updates per-path results but does not override the signalled validity.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::ResourceConfig;
use crate::reconciler::Reconciliation;
use crate::validator::PathCheck;

/// Top-level phase gating which views are reachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolving where the resources document lives
    #[default]
    Bootstrapping,
    /// Loading the document and running the first reconciliation
    Initializing,
    /// No valid configuration; the editor must be reachable
    NeedsConfiguration,
    /// All configured paths are accessible; the gallery is reachable
    Configured,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Bootstrapping => "bootstrapping",
            Phase::Initializing => "initializing",
            Phase::NeedsConfiguration => "needs_configuration",
            Phase::Configured => "configured",
        }
    }

    /// Whether the startup sequence has finished.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::NeedsConfiguration | Phase::Configured)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a reconciliation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOrigin {
    /// First reconciliation after loading the document
    Initial,
    /// After a successful add or remove
    Mutation,
    /// Manual re-check
    Recheck,
}

/// Signals pushed by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// `config-status`: overall validity as observed outside the core
    ConfigStatus(bool),
    /// `config-required`: the editor must be shown
    ConfigRequired(bool),
    /// `config-error`: message to surface
    ConfigError(String),
}

/// Free-text path the user is typing, validated independently of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingInput {
    pub text: String,
    /// Token of the latest keystroke; older validation results are dropped
    pub generation: u64,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A debounced validation is scheduled or running
    pub validating: bool,
}

impl Default for PendingInput {
    fn default() -> Self {
        Self {
            text: String::new(),
            generation: 0,
            is_valid: true,
            error: None,
            validating: false,
        }
    }
}

/// Latest overall validity and the per-path results behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigStatus {
    pub valid: bool,
    pub message: String,
    pub checks: Vec<PathCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Default for ConfigStatus {
    fn default() -> Self {
        Self {
            valid: false,
            message: "Configuration not checked yet".to_string(),
            checks: Vec::new(),
            checked_at: None,
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ResolveLocation,
    LoadDocument,
    Reconcile {
        revision: u64,
        epoch: u64,
        origin: ReconcileOrigin,
        document: ResourceConfig,
    },
    /// Validate a path the user wants to add
    ValidateCandidate { path: String },
    /// Debounced validation of the free-text input
    ValidateInput { generation: u64, text: String },
    /// Fire-and-forget save of the document at `revision`
    Persist {
        revision: u64,
        document: ResourceConfig,
    },
    PickDirectory,
}

/// Inputs to the state machine: user actions, effect results, and signals.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Begin bootstrapping
    Start,
    /// Re-enter initialization on demand
    Reload,
    LocationResolved(PathBuf),
    LocationFailed(String),
    DocumentLoaded(ResourceConfig),
    LoadFailed(String),
    Reconciled {
        revision: u64,
        epoch: u64,
        origin: ReconcileOrigin,
        outcome: Reconciliation,
    },
    /// Manual re-validation of the committed document
    Recheck,
    AddPath(String),
    CandidateChecked(PathCheck),
    RemovePath(String),
    Browse,
    DirectoryPicked(Option<String>),
    InputChanged(String),
    InputValidated { generation: u64, check: PathCheck },
    /// Commit the free-text input through `AddPath`
    SubmitInput,
    Saved { revision: u64 },
    SaveFailed { revision: u64, message: String },
    Signal(Signal),
    ShowGallery,
    HideGallery,
    OpenEditor,
    CloseEditor,
}

/// The single state container for the configuration UI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppState {
    pub phase: Phase,
    /// Gallery overlay; only ever true while `Configured`
    pub gallery_visible: bool,
    pub editor_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub document: ResourceConfig,
    pub revision: u64,
    pub status: ConfigStatus,
    pub signal_epoch: u64,
    pub pending_input: PendingInput,
    /// Paths currently being validated for addition
    pub pending_adds: Vec<String>,
    /// Inline error next to the add controls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_error: Option<String>,
    /// Non-blocking banner error (location, load, save, environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_revision: Option<u64>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.phase == Phase::Configured
    }

    /// Apply one event and return the effects to run.
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Start => {
                self.enter(Phase::Bootstrapping);
                vec![Effect::ResolveLocation]
            }
            Event::Reload => {
                if self.config_path.is_some() {
                    self.enter(Phase::Initializing);
                    vec![Effect::LoadDocument]
                } else {
                    self.enter(Phase::Bootstrapping);
                    vec![Effect::ResolveLocation]
                }
            }
            Event::LocationResolved(path) => {
                self.config_path = Some(path);
                self.enter(Phase::Initializing);
                vec![Effect::LoadDocument]
            }
            Event::LocationFailed(message) => {
                tracing::warn!(%message, "configuration location unresolved");
                self.error = Some(message);
                self.require_configuration();
                Vec::new()
            }
            Event::DocumentLoaded(document) => {
                self.error = None;
                self.replace_document(document);
                vec![self.reconcile_effect(ReconcileOrigin::Initial)]
            }
            Event::LoadFailed(message) => {
                tracing::warn!(%message, "falling back to default document");
                self.error = Some(message);
                self.replace_document(ResourceConfig::default());
                self.status = ConfigStatus {
                    valid: false,
                    message: "No resources configured".to_string(),
                    checks: Vec::new(),
                    checked_at: None,
                };
                self.require_configuration();
                Vec::new()
            }
            Event::Reconciled {
                revision,
                epoch,
                origin,
                outcome,
            } => {
                self.on_reconciled(revision, epoch, origin, outcome);
                Vec::new()
            }
            Event::Recheck => vec![self.reconcile_effect(ReconcileOrigin::Recheck)],
            Event::AddPath(path) => self.on_add_path(path),
            Event::CandidateChecked(check) => self.on_candidate_checked(check),
            Event::RemovePath(path) => self.on_remove_path(&path),
            Event::Browse => vec![Effect::PickDirectory],
            Event::DirectoryPicked(Some(path)) => self.on_add_path(path),
            Event::DirectoryPicked(None) => Vec::new(),
            Event::InputChanged(text) => self.on_input_changed(text),
            Event::InputValidated { generation, check } => {
                if generation != self.pending_input.generation {
                    tracing::debug!(
                        generation,
                        latest = self.pending_input.generation,
                        "discarding stale input validation"
                    );
                } else {
                    self.pending_input.is_valid = check.valid;
                    self.pending_input.error = check.error;
                    self.pending_input.validating = false;
                }
                Vec::new()
            }
            Event::SubmitInput => {
                let text = self.pending_input.text.trim().to_string();
                self.on_add_path(text)
            }
            Event::Saved { revision } => {
                self.saved_revision = Some(self.saved_revision.map_or(revision, |r| r.max(revision)));
                if revision == self.revision {
                    self.error = None;
                }
                Vec::new()
            }
            Event::SaveFailed { revision, message } => {
                tracing::warn!(revision, %message, "save failed; keeping in-memory document");
                self.error = Some(message);
                Vec::new()
            }
            Event::Signal(signal) => {
                self.on_signal(signal);
                Vec::new()
            }
            Event::ShowGallery => {
                if self.phase == Phase::Configured {
                    self.gallery_visible = true;
                    self.notice = None;
                } else {
                    self.notice = Some("The gallery needs a valid configuration".to_string());
                }
                Vec::new()
            }
            Event::HideGallery => {
                self.gallery_visible = false;
                Vec::new()
            }
            Event::OpenEditor => {
                self.editor_open = true;
                Vec::new()
            }
            Event::CloseEditor => {
                self.editor_open = false;
                Vec::new()
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::info!(from = %self.phase, to = %phase, "phase transition");
        }
        self.phase = phase;
        if phase != Phase::Configured {
            self.gallery_visible = false;
        }
    }

    fn require_configuration(&mut self) {
        self.enter(Phase::NeedsConfiguration);
        self.editor_open = true;
    }

    /// Move into the phase implied by `valid`, once startup is over.
    fn settle(&mut self, valid: bool) {
        if valid {
            self.enter(Phase::Configured);
        } else {
            self.require_configuration();
        }
    }

    fn replace_document(&mut self, document: ResourceConfig) {
        self.document = document;
        self.revision += 1;
    }

    fn reconcile_effect(&self, origin: ReconcileOrigin) -> Effect {
        Effect::Reconcile {
            revision: self.revision,
            epoch: self.signal_epoch,
            origin,
            document: self.document.clone(),
        }
    }

    fn on_reconciled(
        &mut self,
        revision: u64,
        epoch: u64,
        origin: ReconcileOrigin,
        outcome: Reconciliation,
    ) {
        if revision != self.revision {
            tracing::debug!(
                revision,
                current = self.revision,
                "discarding reconciliation for replaced document"
            );
            return;
        }

        self.status.checks = outcome.checks;
        self.status.checked_at = Some(outcome.checked_at);
        if epoch == self.signal_epoch {
            self.status.valid = outcome.valid;
            self.status.message = outcome.message;
        } else {
            // validity and message stay as the signal left them
            tracing::debug!(epoch, latest = self.signal_epoch, "signal arrived mid-reconciliation");
        }

        let valid = self.status.valid;
        let first_settle = origin == ReconcileOrigin::Initial || !self.phase.is_settled();
        self.settle(valid);
        if first_settle {
            self.gallery_visible = valid;
            self.editor_open = !valid;
        }
    }

    /// Mutations are refused until the loaded document has settled, so a
    /// pending load can never replace a committed change.
    fn loading_guard(&self) -> Option<String> {
        match self.phase {
            Phase::Bootstrapping | Phase::Initializing => {
                Some("The configuration is still loading".to_string())
            }
            Phase::NeedsConfiguration | Phase::Configured => None,
        }
    }

    fn on_add_path(&mut self, path: String) -> Vec<Effect> {
        if let Some(reason) = self.loading_guard() {
            self.add_error = Some(reason);
            return Vec::new();
        }
        if self.pending_adds.contains(&path) {
            self.add_error = Some(format!("Path is already being added: {}", path));
            return Vec::new();
        }
        if let Err(e) = self.document.check_addable(&path) {
            self.add_error = Some(e.to_string());
            return Vec::new();
        }

        self.add_error = None;
        self.pending_adds.push(path.clone());
        vec![Effect::ValidateCandidate { path }]
    }

    fn on_candidate_checked(&mut self, check: PathCheck) -> Vec<Effect> {
        self.pending_adds.retain(|p| p != &check.path);

        if !check.valid {
            let reason = check
                .error
                .unwrap_or_else(|| "path is not accessible".to_string());
            self.add_error = Some(format!("Path is not usable: {}", reason));
            return Vec::new();
        }
        if let Some(reason) = self.loading_guard() {
            tracing::debug!(path = %check.path, "dropping add that finished during a reload");
            self.add_error = Some(reason);
            return Vec::new();
        }

        let next = match self.document.with_path(&check.path) {
            Ok(next) => next,
            Err(e) => {
                self.add_error = Some(e.to_string());
                return Vec::new();
            }
        };

        tracing::info!(path = %check.path, "resource path added");
        self.replace_document(next);
        if self.pending_input.text.trim() == check.path {
            self.clear_input();
        }
        self.mutation_effects()
    }

    fn on_remove_path(&mut self, path: &str) -> Vec<Effect> {
        if let Some(reason) = self.loading_guard() {
            self.notice = Some(reason);
            return Vec::new();
        }
        let Some(next) = self.document.without_path(path) else {
            self.notice = Some(format!("Path is not configured: {}", path));
            return Vec::new();
        };

        tracing::info!(path, "resource path removed");
        self.replace_document(next);
        self.mutation_effects()
    }

    fn mutation_effects(&self) -> Vec<Effect> {
        vec![
            Effect::Persist {
                revision: self.revision,
                document: self.document.clone(),
            },
            self.reconcile_effect(ReconcileOrigin::Mutation),
        ]
    }

    fn on_input_changed(&mut self, text: String) -> Vec<Effect> {
        let generation = self.pending_input.generation + 1;
        if text.trim().is_empty() {
            self.pending_input = PendingInput {
                text,
                generation,
                ..PendingInput::default()
            };
            return Vec::new();
        }

        self.pending_input.text = text.clone();
        self.pending_input.generation = generation;
        self.pending_input.validating = true;
        vec![Effect::ValidateInput { generation, text }]
    }

    fn clear_input(&mut self) {
        self.pending_input = PendingInput {
            generation: self.pending_input.generation + 1,
            ..PendingInput::default()
        };
    }

    fn on_signal(&mut self, signal: Signal) {
        match signal {
            Signal::ConfigStatus(valid) => {
                self.signal_epoch += 1;
                let valid = valid && !self.document.is_empty();
                self.status.valid = valid;
                self.status.message = if self.document.is_empty() {
                    "No resources configured".to_string()
                } else if valid {
                    "Configuration reported valid".to_string()
                } else {
                    "Configuration reported invalid".to_string()
                };
                if self.phase.is_settled() {
                    self.settle(valid);
                }
            }
            Signal::ConfigRequired(true) => {
                self.signal_epoch += 1;
                self.status.valid = false;
                self.status.message = "Configuration required".to_string();
                self.require_configuration();
            }
            Signal::ConfigRequired(false) => {
                if self.phase == Phase::Configured {
                    self.editor_open = false;
                }
            }
            Signal::ConfigError(message) => {
                self.error = Some(message);
            }
        }
    }
}
