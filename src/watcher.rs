//! Source file watcher
//!
//! Watches the directory containing a source file with the `notify` crate and
//! emits a debounced event whenever that file changes. The parent directory is
//! watched instead of the file itself so editors that save by rename are seen.

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Delay used to coalesce bursts of file system events
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// Events emitted by the source watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The watched file was written or recreated
    Changed(PathBuf),
    /// The watched file disappeared
    Removed(PathBuf),
    /// Watcher error occurred
    WatcherError(String),
}

/// Keeps the debouncer alive for as long as the watch should run
pub struct SourceWatcher {
    _watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    path: PathBuf,
}

impl SourceWatcher {
    /// Start watching `path`, sending events to `event_tx`
    pub fn new(path: &Path, event_tx: mpsc::UnboundedSender<SourceEvent>) -> Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Cannot watch '{}'", path.display()))?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .context("Watched file has no parent directory")?;
        let target = path.clone();

        let mut debouncer = new_debouncer(
            DEBOUNCE_DELAY,
            None,
            move |result: DebounceEventResult| {
                Self::handle_events(result, &target, &event_tx);
            },
        )
        .context("Failed to create file watcher debouncer")?;

        debouncer
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to start watching '{}'", parent.display()))?;

        Ok(Self {
            _watcher: debouncer,
            path,
        })
    }

    fn handle_events(
        result: DebounceEventResult,
        target: &Path,
        event_tx: &mpsc::UnboundedSender<SourceEvent>,
    ) {
        match result {
            Ok(events) => {
                let mut last = None;
                for event in events {
                    if !event.paths.iter().any(|p| p == target) {
                        continue;
                    }
                    last = classify(&event.kind, target).or(last);
                }
                // One notification per debounce window is enough
                if let Some(e) = last {
                    let _ = event_tx.send(e);
                }
            }
            Err(errors) => {
                for error in errors {
                    let _ = event_tx.send(SourceEvent::WatcherError(error.to_string()));
                }
            }
        }
    }

    /// Canonical path of the watched file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn classify(kind: &EventKind, target: &Path) -> Option<SourceEvent> {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Create(_) | EventKind::Modify(_) => {
            Some(SourceEvent::Changed(target.to_path_buf()))
        }
        EventKind::Remove(_) => Some(SourceEvent::Removed(target.to_path_buf())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, MetadataKind, RemoveKind};

    #[test]
    fn test_classify_event_kinds() {
        let target = Path::new("/tmp/snippet.py");
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any), target),
            Some(SourceEvent::Changed(target.to_path_buf()))
        );
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), target),
            Some(SourceEvent::Changed(target.to_path_buf()))
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File), target),
            Some(SourceEvent::Removed(target.to_path_buf()))
        );
        assert_eq!(
            classify(
                &EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
                target
            ),
            None
        );
        assert_eq!(classify(&EventKind::Any, target), None);
    }

    #[test]
    fn test_missing_file_cannot_be_watched() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(SourceWatcher::new(Path::new("/definitely/not/here.rs"), tx).is_err());
    }
}
