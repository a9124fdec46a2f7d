// linetail - engine/tail.rs
//
// Public façade: construct an engine, consume its record sequence, query
// the durable offset, and stop it.
//
// ```no_run
// use linetail::{Config, Tail};
//
// let tail = Tail::file("/var/log/app.log", Config::default())?;
// for record in tail.lines.iter() {
//     println!("{}: {}", record.position, record.text);
// }
// let _ = tail.stop();
// # Ok::<(), linetail::TailError>(())
// ```

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::core::model::{Config, Record};
use crate::engine::{cleanup, follow, Shared};
use crate::util::constants::LINES_CHANNEL_CAPACITY;
use crate::util::error::TailError;

/// Handle to a running file-tailing engine.
///
/// Construction spawns one background worker (the follow loop); the handle
/// is the only way to observe or control it. The record sequence is
/// single-consumer and closes exactly once — when the worker terminates
/// for any reason.
#[derive(Debug)]
pub struct Tail {
    path: PathBuf,

    /// The output sequence. Iterate with `tail.lines.iter()`; iteration
    /// ends when the engine closes. A consumer that stops reading early
    /// must call [`stop`](Self::stop) so the worker does not linger.
    pub lines: Receiver<Record>,

    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

// `Receiver<Record>` is the only field that isn't `Sync`; it is
// single-consumer by contract (see `lines` above), so sharing `&Tail`
// across threads never results in concurrent access to it.
unsafe impl Sync for Tail {}

impl Tail {
    /// Start tailing `path` with the given configuration.
    ///
    /// Immediate errors are restricted to configuration problems and, when
    /// `must_exist` is set, the initial absence or unreadability of the
    /// path. Everything that happens later (rotation, deletion, I/O
    /// failure) is reported through the record sequence and [`err`](Self::err).
    pub fn file(path: impl Into<PathBuf>, config: Config) -> Result<Self, TailError> {
        let path = path.into();
        config.validate()?;
        if config.must_exist {
            std::fs::metadata(&path).map_err(|source| TailError::Io {
                path: path.clone(),
                operation: "open",
                source,
            })?;
        }

        let (tx, rx) = mpsc::sync_channel(LINES_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared::new());
        cleanup::register(&shared);

        let worker = std::thread::Builder::new()
            .name("linetail-follow".to_string())
            .spawn({
                let path = path.clone();
                let shared = Arc::clone(&shared);
                move || follow::run(path, config, shared, tx)
            })
            .map_err(|source| TailError::Io {
                path: path.clone(),
                operation: "spawn",
                source,
            })?;

        tracing::debug!(path = %path.display(), "Tail started");
        Ok(Self {
            path,
            lines: rx,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The path this engine is tailing.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read offset of the current file at the moment of call.
    ///
    /// The snapshot is the end offset of the last record the worker handed
    /// to the output channel, so it may lead the last record *consumed*
    /// from [`lines`](Self::lines) by at most one in-flight record. A
    /// consumer can persist `(path, offset)` and resume later with
    /// `location = { offset, whence = "start" }`.
    ///
    /// Once the engine has failed, the terminal error is returned instead.
    pub fn tell(&self) -> Result<u64, Arc<TailError>> {
        if let Some(error) = self.shared.terminal_error() {
            return Err(error);
        }
        Ok(self.shared.load_offset())
    }

    /// Request cancellation and wait for the output sequence to close.
    ///
    /// Idempotent. Returns the terminal error if the engine had already
    /// failed; a stop of a healthy engine returns `Ok(())`.
    pub fn stop(&self) -> Result<(), Arc<TailError>> {
        self.shared.request_cancel();
        let handle = {
            let mut slot = match self.worker.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(path = %self.path.display(), "Tail worker panicked");
            }
        }
        match self.shared.terminal_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// [`stop`](Self::stop), discarding the result. Convenience for
    /// teardown paths that do not care about the terminal error.
    pub fn done(&self) {
        let _ = self.stop();
    }

    /// The terminal error, if the engine has failed. Stable once the
    /// sequence has closed.
    pub fn err(&self) -> Option<Arc<TailError>> {
        self.shared.terminal_error()
    }
}

impl Drop for Tail {
    /// Dropping the handle requests cancellation but does not wait; the
    /// worker notices within its cancellation bound and exits. Call
    /// [`stop`](Self::stop) for a deterministic shutdown.
    fn drop(&mut self) {
        self.shared.request_cancel();
    }
}
