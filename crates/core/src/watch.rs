//! Bridges filesystem notifications into change events for the coordinator.

use crate::coordinator::Coordinator;
use crate::error::{ModloadError, Result};
use modload_api::{ChangeEvent, ChangeKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct FsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FsWatcher {
    fn new(roots: &[PathBuf]) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    async fn next_event_async(&mut self) -> Option<Event> {
        match self.rx.recv().await {
            Some(Ok(event)) => Some(event),
            _ => None,
        }
    }
}

fn change_kind(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => ChangeKind::Modified,
    }
}

impl Coordinator {
    /// Watch every root for changes and feed them through
    /// [`Coordinator::handle_change`]. Events are debounced so an editor's
    /// burst of writes triggers one reload. The task exits when
    /// `cancel_token` is cancelled or the coordinator is dropped.
    pub async fn start_watch_with_token(
        self: Arc<Self>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        let roots = self.roots().to_vec();
        let unit_extension = self.convention().unit_extension.clone();
        let mut watcher =
            FsWatcher::new(&roots).map_err(|e| ModloadError::Watch(e.to_string()))?;

        let coordinator = Arc::downgrade(&self);

        tokio::spawn(async move {
            tracing::info!("watching {} root(s) for changes", roots.len());
            let mut pending: Vec<Event> = Vec::new();
            let debounce_interval = Duration::from_millis(500);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        break;
                    }
                    event = watcher.next_event_async() => {
                        match event {
                            Some(e) => pending.push(e),
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(debounce_interval), if !pending.is_empty() => {
                        // Latest kind per path wins within one debounce window.
                        let mut changes: HashMap<PathBuf, ChangeKind> = HashMap::new();
                        for event in pending.drain(..) {
                            let kind = change_kind(&event.kind);
                            for path in event.paths {
                                if is_unit_path(&path, &unit_extension) {
                                    changes.insert(path, kind);
                                }
                            }
                        }

                        if changes.is_empty() {
                            continue;
                        }
                        let Some(coordinator) = coordinator.upgrade() else {
                            break;
                        };
                        tracing::info!("applying {} filesystem change(s)", changes.len());
                        for (path, kind) in changes {
                            let report = coordinator.handle_change(&ChangeEvent::now(path, kind));
                            for (name, error) in &report.failed {
                                tracing::error!("reload of {name} failed: {error}");
                            }
                        }
                    }
                }
            }
            tracing::info!("file watcher task ended");
        });

        Ok(())
    }

    /// Watch with the coordinator's own cancellation token; `teardown`
    /// stops the watcher.
    pub async fn watch(self: Arc<Self>) -> Result<()> {
        let cancel_token = self.watch_token();
        self.start_watch_with_token(cancel_token).await
    }
}

fn is_unit_path(path: &Path, unit_extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == unit_extension)
}
