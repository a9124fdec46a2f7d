// linetail - watch/poll.rs
//
// Stat-polling change source.
//
// Sleeps for the configured interval, stats the path, and applies the
// shared decision rule. The fallback mode for filesystems where kernel
// notifications are unreliable (network mounts, some containers), and the
// downgrade target when the kernel watcher fails.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::platform::fs::FileIdentity;
use crate::util::error::WatchError;
use crate::watch::{classify, sleep_interruptible, Change, ChangeSource};

/// Polling change source. One per engine; owns no OS resources beyond the
/// stats it issues.
#[derive(Debug)]
pub struct PollSource {
    path: PathBuf,
    interval: Duration,
    cancel: Arc<AtomicBool>,
}

impl PollSource {
    pub fn new(path: PathBuf, interval: Duration, cancel: Arc<AtomicBool>) -> Self {
        Self {
            path,
            interval,
            cancel,
        }
    }
}

impl ChangeSource for PollSource {
    fn block_until_exists(&mut self) -> Result<Change, WatchError> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(Change::Cancelled);
            }
            match std::fs::metadata(&self.path) {
                Ok(_) => return Ok(Change::Appeared),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(WatchError::Stat {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
            if sleep_interruptible(&self.cancel, self.interval) {
                return Ok(Change::Cancelled);
            }
        }
    }

    fn wait_for_change(
        &mut self,
        offset: u64,
        identity: FileIdentity,
    ) -> Result<Change, WatchError> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(Change::Cancelled);
            }
            if let Some(change) = classify(&self.path, offset, identity)? {
                return Ok(change);
            }
            if sleep_interruptible(&self.cancel, self.interval) {
                return Ok(Change::Cancelled);
            }
        }
    }

    fn close(&mut self) {}
}

// =============================================================================
// Tests
// =============================================================================
