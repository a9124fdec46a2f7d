// linetail - watch/mod.rs
//
// Change-notification layer.
//
// A change source answers one question for the follow loop: "has the file
// at this path grown past my offset, been replaced, been rewound, or
// disappeared?" Two implementations exist behind the same contract — a
// kernel-event source (`events`) and a stat-polling source (`poll`).
//
// Both sources make the actual change *decision* by statting the path and
// applying a single shared rule (`classify`); kernel events only decide
// when to look. This keeps the two modes behaviourally identical, which
// the rotation and truncation handling in the follow loop relies on.

pub mod events;
pub mod poll;

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::platform::fs::{identity_of_metadata, FileIdentity};
use crate::util::constants::CANCEL_CHECK_INTERVAL_MS;
use crate::util::error::WatchError;

/// What happened to the watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The path exists (resolution of `block_until_exists`).
    Appeared,

    /// The file grew past the caller's offset; there are new bytes to read.
    Grew,

    /// The file at the path is no longer the file the caller was reading:
    /// its identity changed (rename-away or unlink-then-recreate).
    Rotated,

    /// Same identity, but the size shrank below the caller's offset. The
    /// file was rewound in place; reading restarts from offset 0.
    Truncated,

    /// The path disappeared with no replacement.
    Deleted,

    /// Cancellation was requested while waiting.
    Cancelled,
}

/// Contract between the follow loop and a change source.
///
/// The follow loop never stats the file to decide whether there is new
/// data: it reads until a short read, then parks here. The source's job is
/// to rate-limit wakeups. Spurious `Grew` results are allowed; the follow
/// loop simply returns to waiting after an empty read.
pub trait ChangeSource: Send {
    /// Block until the path first exists. Resolves `Appeared` or
    /// `Cancelled`.
    fn block_until_exists(&mut self) -> Result<Change, WatchError>;

    /// Block until something happens to the file, given the caller's
    /// current read offset and the identity of its open handle.
    fn wait_for_change(
        &mut self,
        offset: u64,
        identity: FileIdentity,
    ) -> Result<Change, WatchError>;

    /// Release watch resources. Idempotent.
    fn close(&mut self);
}

/// The shared decision rule: stat the path and compare against the
/// caller's `{offset, identity}`. Returns `None` when nothing relevant
/// changed (keep waiting).
pub(crate) fn classify(
    path: &Path,
    offset: u64,
    identity: FileIdentity,
) -> Result<Option<Change>, WatchError> {
    let md = match std::fs::metadata(path) {
        Ok(md) => md,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some(Change::Deleted)),
        Err(source) => {
            return Err(WatchError::Stat {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if identity_of_metadata(&md) != identity {
        return Ok(Some(Change::Rotated));
    }
    let size = md.len();
    if size > offset {
        Ok(Some(Change::Grew))
    } else if size < offset {
        Ok(Some(Change::Truncated))
    } else {
        Ok(None)
    }
}

/// Sleep for `total`, waking every cancel-check slice to look at the flag.
/// Returns true when cancellation was requested.
pub(crate) fn sleep_interruptible(cancel: &AtomicBool, total: Duration) -> bool {
    let slice = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    cancel.load(Ordering::SeqCst)
}

// =============================================================================
// Tests
// =============================================================================
