// linetail - watch/events.rs
//
// Kernel-event change source, built on the `notify` crate.
//
// The watch is registered on the *containing directory*, not the file:
// rename and unlink of the target are directory-level events, and on the
// platforms that matter a directory watch also reports writes to its
// direct children. Events are treated purely as wakeup hints — every
// decision goes through the shared stat classifier, and a slow self-stat
// tick catches truncations that produced no usable event.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::platform::fs::FileIdentity;
use crate::util::constants::{CANCEL_CHECK_INTERVAL_MS, SELF_STAT_INTERVAL_MS};
use crate::util::error::WatchError;
use crate::watch::{classify, Change, ChangeSource};

type EventResult = Result<notify::Event, notify::Error>;

/// Kernel-event change source. One per engine.
pub struct EventSource {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    rx: Receiver<EventResult>,
    cancel: Arc<AtomicBool>,
}

impl EventSource {
    /// Register a watch on the directory containing `path`.
    ///
    /// Fails when the watcher backend cannot start or the directory cannot
    /// be watched (typically: it does not exist). The caller downgrades to
    /// polling on failure.
    pub fn new(path: &Path, cancel: Arc<AtomicBool>) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: EventResult| {
            // Receiver gone means the engine is shutting down.
            let _ = tx.send(res);
        })
        .map_err(|source| WatchError::Init { source })?;

        let dir = watch_dir(path);
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            path = %path.display(),
            dir = %dir.display(),
            "Kernel event watch registered"
        );

        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
            rx,
            cancel,
        })
    }

    /// True when the event mentions the watched path (or carries no path
    /// information at all, which some backends produce on overflow).
    fn relevant(&self, event: &notify::Event) -> bool {
        if event.paths.is_empty() {
            return true;
        }
        event
            .paths
            .iter()
            .any(|p| p == &self.path || p.file_name() == self.path.file_name())
    }

    /// Drop everything already queued. A burst of writes produces a burst
    /// of events; one stat answers for all of them.
    fn drain_queued(&self) -> Result<(), WatchError> {
        loop {
            match self.rx.try_recv() {
                Ok(Ok(_)) => continue,
                Ok(Err(source)) => return Err(WatchError::Backend { source }),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(WatchError::EventsClosed {
                        path: self.path.clone(),
                    })
                }
            }
        }
    }

    /// Stat-based existence check, so permission failures surface instead
    /// of looping forever.
    fn path_exists(&self) -> Result<bool, WatchError> {
        match std::fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(WatchError::Stat {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Wait one cancel-check slice for an event. Returns whether a relevant
    /// event arrived.
    fn next_hint(&self) -> Result<bool, WatchError> {
        match self
            .rx
            .recv_timeout(Duration::from_millis(CANCEL_CHECK_INTERVAL_MS))
        {
            Ok(Ok(event)) => Ok(self.relevant(&event)),
            Ok(Err(source)) => Err(WatchError::Backend { source }),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(WatchError::EventsClosed {
                path: self.path.clone(),
            }),
        }
    }
}

impl ChangeSource for EventSource {
    fn block_until_exists(&mut self) -> Result<Change, WatchError> {
        let self_stat = Duration::from_millis(SELF_STAT_INTERVAL_MS);
        let mut last_stat = Instant::now();
        if self.path_exists()? {
            return Ok(Change::Appeared);
        }
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(Change::Cancelled);
            }
            let hint = self.next_hint()?;
            if hint || last_stat.elapsed() >= self_stat {
                last_stat = Instant::now();
                if self.path_exists()? {
                    return Ok(Change::Appeared);
                }
            }
        }
    }

    fn wait_for_change(
        &mut self,
        offset: u64,
        identity: FileIdentity,
    ) -> Result<Change, WatchError> {
        let self_stat = Duration::from_millis(SELF_STAT_INTERVAL_MS);
        let mut last_stat = Instant::now();

        // The change may predate this wait: events that fired while the
        // follow loop was still reading are sitting in the queue, and a
        // rotation can complete entirely between two reads.
        self.drain_queued()?;
        if let Some(change) = classify(&self.path, offset, identity)? {
            return Ok(change);
        }

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(Change::Cancelled);
            }
            let hint = self.next_hint()?;
            if hint {
                self.drain_queued()?;
            }
            if hint || last_stat.elapsed() >= self_stat {
                last_stat = Instant::now();
                if let Some(change) = classify(&self.path, offset, identity)? {
                    return Ok(change);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            tracing::debug!(path = %self.path.display(), "Kernel event watch released");
        }
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Directory whose events cover `path`. An empty parent means the path is
/// a bare file name relative to the current directory.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// =============================================================================
// Tests
// =============================================================================
