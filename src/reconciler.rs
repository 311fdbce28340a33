//! Overall validity of a resources document.
//!
//! A reconciliation re-validates every included path from scratch and
//! condenses the results into one boolean plus a status message. The message
//! keeps the empty-list case apart from the partially-broken case so the
//! user can tell "nothing configured" from "some folders went missing".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::ResourceConfig;
use crate::storage::PathProbe;
use crate::validator::{PathCheck, PathValidator, batch_valid};

/// Coarse classification of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigHealth {
    /// `include` is empty
    Empty,
    /// Every included path is accessible
    AllValid,
    /// At least one included path is inaccessible
    PartiallyInvalid,
}

/// Result of validating a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub valid: bool,
    pub health: ConfigHealth,
    pub message: String,
    /// Number of included paths that failed validation
    pub inaccessible: usize,
    /// Per-path results in `include` order
    pub checks: Vec<PathCheck>,
    pub checked_at: DateTime<Utc>,
}

impl Reconciliation {
    /// Build the outcome from per-path results.
    pub fn from_checks(checks: Vec<PathCheck>) -> Self {
        let valid = batch_valid(&checks);
        let broken: Vec<&str> = checks
            .iter()
            .filter(|c| !c.valid)
            .map(|c| c.path.as_str())
            .collect();

        let (health, message) = if checks.is_empty() {
            (ConfigHealth::Empty, "No resources configured".to_string())
        } else if broken.is_empty() {
            (
                ConfigHealth::AllValid,
                format!("All {} resource path(s) are accessible", checks.len()),
            )
        } else {
            (
                ConfigHealth::PartiallyInvalid,
                format!(
                    "{} of {} resource path(s) are inaccessible: {}",
                    broken.len(),
                    checks.len(),
                    broken.join(", ")
                ),
            )
        };

        let inaccessible = broken.len();
        Self {
            valid,
            health,
            message,
            inaccessible,
            checks,
            checked_at: Utc::now(),
        }
    }

    /// Paths that failed validation.
    pub fn invalid_paths(&self) -> impl Iterator<Item = &PathCheck> {
        self.checks.iter().filter(|c| !c.valid)
    }
}

/// Validate every path of `document` and derive overall validity.
pub async fn reconcile<P: PathProbe>(
    document: &ResourceConfig,
    validator: &PathValidator<P>,
) -> Reconciliation {
    if document.is_empty() {
        return Reconciliation::from_checks(Vec::new());
    }

    let checks = validator.check_batch(document.include()).await;
    let outcome = Reconciliation::from_checks(checks);
    tracing::debug!(
        valid = outcome.valid,
        health = ?outcome.health,
        paths = outcome.checks.len(),
        "reconciled resources"
    );
    outcome
}
