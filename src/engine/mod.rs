// linetail - engine/mod.rs
//
// Orchestration layer: the public Tail handle, the follow-loop worker it
// spawns, and the process-wide cleanup registry.
//
// Ownership is strictly one-way: the handle owns the worker thread, the
// worker owns the open file and the change source. The only state they
// share is `Shared` below, and the only control signal that flows back
// from the handle is the cancellation flag.

pub mod cleanup;
pub mod tail;

pub(crate) mod follow;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::util::error::TailError;

/// State shared between a Tail handle and its follow worker.
#[derive(Debug)]
pub(crate) struct Shared {
    /// One-way cancellation signal, observed at every suspension point in
    /// the worker. Shared with the change sources, which block on their own
    /// OS primitives and need to watch the flag themselves.
    cancel: Arc<AtomicBool>,

    /// Byte offset the worker has emitted through: the end offset of the
    /// last record handed to the output channel. This is what `tell()`
    /// reports, so it may lead the last *consumed* record by at most the
    /// channel capacity.
    offset: AtomicU64,

    /// Terminal error, written once by the worker on failure.
    error: Mutex<Option<Arc<TailError>>>,

    /// Set by the worker just before it exits and the channel closes.
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            offset: AtomicU64::new(0),
            error: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel
    }

    /// Clone of the cancellation flag for handing to a change source.
    pub(crate) fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub(crate) fn store_offset(&self, offset: u64) {
        self.offset.store(offset, Ordering::SeqCst);
    }

    pub(crate) fn load_offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Terminal error, if the worker has recorded one. Stable once set.
    pub(crate) fn terminal_error(&self) -> Option<Arc<TailError>> {
        match self.error.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Record the terminal error. First writer wins.
    pub(crate) fn set_terminal_error(&self, error: Arc<TailError>) {
        let mut slot = match self.error.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}
