//! File system watcher with debouncing.
//!
//! Used twice: the external bundler watches the project tree for source
//! changes, and the dev server watches the config and mock files.

use crate::error::{CliError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// What part of the root a watcher reports on.
#[derive(Debug, Clone)]
pub enum WatchScope {
    /// Everything under the root except hidden entries, `node_modules` and
    /// the listed directories
    Tree { ignore: Vec<PathBuf> },
    /// Only these files, or anything below them when they are directories
    Paths(Vec<PathBuf>),
}

/// Recursive watcher sending debounced changes through a channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    scope: Arc<RwLock<WatchScope>>,
}

impl FileWatcher {
    /// Start watching `root`.
    ///
    /// Repeated events for the same path within `debounce` are dropped.
    ///
    /// # Errors
    ///
    /// Returns error if watcher cannot be created or directory doesn't exist
    pub fn new(
        root: PathBuf,
        scope: WatchScope,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(100);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let root_clone = root.clone();
        let scope = Arc::new(RwLock::new(scope));
        let event_scope = Arc::clone(&scope);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            for path in &event.paths {
                if Self::should_ignore(path, &root_clone, &event_scope.read()) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // A full channel already holds a pending change.
                let _ = tx.try_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                scope,
            },
            rx,
        ))
    }

    /// Report changes below `paths` too. Only affects [`WatchScope::Paths`].
    pub fn add_paths(&self, paths: impl IntoIterator<Item = PathBuf>) {
        if let WatchScope::Paths(watched) = &mut *self.scope.write() {
            for path in paths {
                if !watched.contains(&path) {
                    watched.push(path);
                }
            }
        }
    }

    fn should_ignore(path: &Path, root: &Path, scope: &WatchScope) -> bool {
        let Ok(rel_path) = path.strip_prefix(root) else {
            return true;
        };

        match scope {
            WatchScope::Paths(watched) => !watched.iter().any(|w| path.starts_with(w)),
            WatchScope::Tree { ignore } => {
                if ignore.iter().any(|dir| path.starts_with(dir)) {
                    return true;
                }
                rel_path.components().any(|component| {
                    component
                        .as_os_str()
                        .to_str()
                        .map_or(false, |name| name == "node_modules" || name.starts_with('.'))
                })
            }
        }
    }
}

/// Wait for the next change, then swallow the burst that follows it.
///
/// Returns `None` once the watcher is gone.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<FileChange>,
    settle: Duration,
) -> Option<Vec<FileChange>> {
    let first = rx.recv().await?;
    Some(settle_batch(first, rx, settle).await)
}

/// `first` plus whatever arrives within `settle` after it.
pub async fn settle_batch(
    first: FileChange,
    rx: &mut mpsc::Receiver<FileChange>,
    settle: Duration,
) -> Vec<FileChange> {
    let mut batch = vec![first];
    tokio::time::sleep(settle).await;
    while let Ok(change) = rx.try_recv() {
        batch.push(change);
    }
    batch
}
