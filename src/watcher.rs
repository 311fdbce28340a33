//! File system watcher for configured resource directories.
//!
//! Watches the parent of every included path. After a burst of changes
//! settles, all paths are re-probed and a `config-status` signal is pushed
//! to the controller whenever the observed validity differs from the state
//! it currently believes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::time::Instant;

use crate::controller::ControllerHandle;
use crate::phase::Signal;
use crate::storage::PathProbe;
use crate::validator::{PathValidator, batch_valid};
use crate::{Error, Result};

/// Debounce duration - wait this long after last event before re-checking
const DEBOUNCE_MS: u64 = 100;

/// Directories to watch for a set of resource paths.
fn watch_targets(paths: &[String]) -> BTreeSet<PathBuf> {
    paths
        .iter()
        .map(|p| {
            let path = Path::new(p);
            path.parent().unwrap_or(path).to_path_buf()
        })
        .collect()
}

/// Watch configured directories until the controller goes away.
pub async fn watch_resources<P: PathProbe>(
    handle: ControllerHandle,
    validator: PathValidator<P>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default(),
    )
    .map_err(|e| Error::Other(format!("could not start watcher: {}", e)))?;

    let mut state_rx = handle.subscribe();
    let mut paths: Vec<String> = Vec::new();
    let mut watched: BTreeSet<PathBuf> = BTreeSet::new();
    let mut believed_valid = false;

    // Debounce state: track when we last saw a relevant event
    let mut pending_update = false;
    let mut last_event_time = Instant::now();

    // Force an initial sync with the current document
    state_rx.mark_changed();

    loop {
        let timeout = if pending_update {
            let debounce = Duration::from_millis(DEBOUNCE_MS);
            debounce.saturating_sub(last_event_time.elapsed())
        } else {
            Duration::from_secs(3600)
        };

        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => match event.kind {
                        notify::EventKind::Create(_)
                        | notify::EventKind::Modify(_)
                        | notify::EventKind::Remove(_) => {
                            pending_update = true;
                            last_event_time = Instant::now();
                        }
                        _ => {}
                    },
                    None => break,
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let (include, valid) = {
                    let state = state_rx.borrow_and_update();
                    (state.document.filters.include.clone(), state.status.valid)
                };
                believed_valid = valid;
                if include != paths {
                    paths = include;
                    let targets = watch_targets(&paths);
                    for gone in watched.difference(&targets) {
                        let _ = watcher.unwatch(gone);
                    }
                    for added in targets.difference(&watched) {
                        if let Err(e) = watcher.watch(added, RecursiveMode::NonRecursive) {
                            tracing::warn!(dir = %added.display(), error = %e, "cannot watch directory");
                        }
                    }
                    tracing::debug!(dirs = targets.len(), "watch set updated");
                    watched = targets;
                }
            }
            _ = tokio::time::sleep(timeout), if pending_update => {
                pending_update = false;
                if paths.is_empty() {
                    continue;
                }
                let valid = batch_valid(&validator.check_batch(&paths).await);
                if valid != believed_valid {
                    tracing::info!(valid, "resource accessibility changed");
                    if handle.signal(Signal::ConfigStatus(valid)).is_err() {
                        break;
                    }
                    believed_valid = valid;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::phase::{Event as AppEvent, Phase};
    use crate::storage::{FileStore, FsProbe};
    use crate::test_utils::{FixedPicker, TestEnv};

    #[test]
    fn test_watch_targets_dedupes_parents() {
        let paths = vec![
            "/photos/2023".to_string(),
            "/photos/2024".to_string(),
            "/scans".to_string(),
        ];
        let targets: Vec<_> = watch_targets(&paths).into_iter().collect();
        assert_eq!(targets, vec![PathBuf::from("/"), PathBuf::from("/photos")]);
    }

    #[test]
    fn test_watch_targets_empty() {
        assert!(watch_targets(&[]).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_removed_directory_signals_needs_configuration() {
        let env = TestEnv::new();
        let photos = env.resource_path().join("photos");
        std::fs::create_dir(&photos).unwrap();

        let mut controller = Controller::new(
            FileStore::at(env.resources_file()),
            FsProbe,
            FixedPicker(None),
        );
        controller.start().await;
        controller.dispatch(AppEvent::AddPath(photos.to_string_lossy().to_string()));
        controller.settle().await;
        assert_eq!(controller.state().phase, Phase::Configured);

        let handle = controller.handle();
        let mut updates = handle.subscribe();
        let watcher = tokio::spawn(watch_resources(
            handle.clone(),
            controller.validator().clone(),
        ));
        let runner = tokio::spawn(controller.run());

        // let the watcher register its directories
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::remove_dir(&photos).unwrap();

        let reached = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if updates.borrow_and_update().phase == Phase::NeedsConfiguration {
                    return true;
                }
                if updates.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await;

        handle.shutdown();
        let state = runner.await.unwrap();
        watcher.abort();

        assert!(matches!(reached, Ok(true)), "watcher never reported the removal");
        assert_eq!(state.phase, Phase::NeedsConfiguration);
        assert!(!state.status.valid);
        assert!(state.editor_open);
    }
}
