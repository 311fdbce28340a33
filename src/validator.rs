//! Path validation on top of a [`PathProbe`].
//!
//! Validation never fails: probe errors, and even a panicking probe task,
//! become a `false` result with a message attached. Batches run every check
//! concurrently and report in input order.
//!
//! Free-text input is validated through [`InputDebouncer`], which hands out
//! monotonically increasing generation tokens. A scheduled validation only
//! runs if its token is still the latest once the quiet period has passed,
//! and whoever applies the result must compare the token again, so a slow
//! stale check can never overwrite a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::storage::PathProbe;

/// Quiet period after the last keystroke before free text is validated.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Outcome of validating one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCheck {
    pub path: String,
    pub valid: bool,
    /// Short user-facing reason when `valid` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PathCheck {
    pub fn ok(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            valid: true,
            error: None,
        }
    }

    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Overall validity of a batch: every path valid, and at least one path.
pub fn batch_valid(checks: &[PathCheck]) -> bool {
    !checks.is_empty() && checks.iter().all(|c| c.valid)
}

/// Wraps a probe with never-fail and batch semantics.
pub struct PathValidator<P> {
    probe: Arc<P>,
}

impl<P> Clone for PathValidator<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
        }
    }
}

impl<P: PathProbe> PathValidator<P> {
    pub fn new(probe: Arc<P>) -> Self {
        Self { probe }
    }

    /// Validate a single path, keeping the failure reason.
    pub async fn check(&self, path: &str) -> PathCheck {
        let probe = Arc::clone(&self.probe);
        let owned = path.to_string();
        // Run on its own task so a panicking probe is contained.
        let outcome = tokio::spawn(async move { probe.probe(&owned).await }).await;

        match outcome {
            Ok(Ok(())) => PathCheck::ok(path),
            Ok(Err(e)) => {
                tracing::debug!(path, error = %e, "path rejected");
                PathCheck::failed(path, e.to_string())
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "path check task failed");
                PathCheck::failed(path, format!("Path check failed: {}", e))
            }
        }
    }

    /// Validate a single path.
    pub async fn validate_one(&self, path: &str) -> bool {
        self.check(path).await.valid
    }

    /// Validate every path concurrently; results are in input order.
    ///
    /// A slow or failing member never holds back or cancels its siblings.
    pub async fn check_batch(&self, paths: &[String]) -> Vec<PathCheck> {
        join_all(paths.iter().map(|p| self.check(p))).await
    }

    /// Boolean form of [`check_batch`](Self::check_batch).
    pub async fn validate_batch(&self, paths: &[String]) -> Vec<bool> {
        self.check_batch(paths)
            .await
            .into_iter()
            .map(|c| c.valid)
            .collect()
    }
}

/// Generation token source for debounced free-text validation.
///
/// Cloning shares the counter, so a scheduled task can ask whether it has
/// been superseded.
#[derive(Debug, Clone)]
pub struct InputDebouncer {
    latest: Arc<AtomicU64>,
    delay: Duration,
}

impl Default for InputDebouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl InputDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record that `generation` is now the newest input.
    pub fn mark(&self, generation: u64) {
        self.latest.fetch_max(generation, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }

    /// Wait out the quiet period, then validate `text` unless a newer
    /// generation arrived meanwhile. `None` means superseded.
    pub async fn run<P: PathProbe>(
        &self,
        generation: u64,
        text: &str,
        validator: &PathValidator<P>,
    ) -> Option<PathCheck> {
        tokio::time::sleep(self.delay).await;
        if !self.is_current(generation) {
            tracing::debug!(generation, "input validation superseded before probing");
            return None;
        }
        Some(validator.check(text).await)
    }
}
