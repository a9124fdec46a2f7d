// linetail - engine/follow.rs
//
// The follow loop: a background worker that owns the open handle, drives
// reads, reacts to change-source events, and emits records into the
// bounded output channel.
//
// State machine:
//
//   OPENING --(opened)--> READING --(short read, follow)--> WAITING
//   READING --(short read, !follow)--> close (flushing any residual)
//   WAITING --(Grew)--> READING
//   WAITING --(Truncated)--> OPENING            (always: restart at 0)
//   WAITING --(Rotated/Deleted, reopen)--> OPENING
//   WAITING --(Rotated/Deleted, !reopen)--> close
//   any     --(cancel / consumer gone)--> close
//   any     --(I/O or watch error)--> close, error recorded
//
// The worker is the sole mutator of the handle and of all read state. It
// tracks two offsets with different meanings: `offset` is the raw number
// of bytes consumed from the current file (what the change source compares
// sizes against), while the shared offset reported by `tell()` advances
// only as records are handed to the channel.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::core::assembler::{AssembledLine, LineAssembler};
use crate::core::model::{Config, Record, POSITION_NONE};
use crate::engine::Shared;
use crate::platform::fs::{identity_of_metadata, FileIdentity};
use crate::util::constants::{RATE_LIMIT_NOTICE, READ_CHUNK_SIZE, SEND_RETRY_INTERVAL_MS};
use crate::util::error::{TailError, WatchError};
use crate::watch::events::EventSource;
use crate::watch::poll::PollSource;
use crate::watch::{sleep_interruptible, Change, ChangeSource};

/// Entry point for the worker thread spawned by `Tail::file`.
pub(crate) fn run(path: PathBuf, config: Config, shared: Arc<Shared>, tx: SyncSender<Record>) {
    let mut worker = Worker::new(path, config, shared, tx);
    let result = worker.drive();
    worker.finish(result);
}

enum State {
    Opening,
    Reading,
    Waiting,
}

enum Opened {
    Ready,
    Stopped,
}

enum ReadStep {
    Progress,
    Eof,
    Stopped,
}

enum WaitStep {
    Read,
    Reopen,
    Closed,
    Stopped,
}

enum SendOutcome {
    Sent,
    Stopped,
}

struct Worker {
    path: PathBuf,
    config: Config,
    shared: Arc<Shared>,
    tx: SyncSender<Record>,
    source: Box<dyn ChangeSource>,
    /// A kernel-watcher failure downgrades to polling exactly once; the
    /// next watch failure is terminal.
    downgraded: bool,
    file: Option<File>,
    identity: FileIdentity,
    /// Raw bytes consumed from the current file since it was opened (or
    /// since the last truncation/reopen reset).
    offset: u64,
    assembler: LineAssembler,
    chunk: Vec<u8>,
    first_open: bool,
}

impl Worker {
    fn new(path: PathBuf, config: Config, shared: Arc<Shared>, tx: SyncSender<Record>) -> Self {
        let max_line_size = config.max_line_size;
        let mut downgraded = false;
        let source = make_source(&path, &config, &shared, &mut downgraded);
        Self {
            path,
            config,
            shared,
            tx,
            source,
            downgraded,
            file: None,
            identity: FileIdentity {
                inode: 0,
                device: 0,
            },
            offset: 0,
            assembler: LineAssembler::new(0, max_line_size),
            chunk: vec![0u8; READ_CHUNK_SIZE],
            first_open: true,
        }
    }

    /// Run the state machine to completion. `Ok(())` is a clean close
    /// (EOF without follow, rotation without reopen, or cancellation);
    /// `Err` is a terminal failure.
    fn drive(&mut self) -> Result<(), TailError> {
        let mut state = State::Opening;
        loop {
            state = match state {
                State::Opening => match self.open()? {
                    Opened::Ready => State::Reading,
                    Opened::Stopped => return Ok(()),
                },
                State::Reading => match self.read_step()? {
                    ReadStep::Progress => State::Reading,
                    ReadStep::Stopped => return Ok(()),
                    ReadStep::Eof => {
                        if self.config.follow {
                            State::Waiting
                        } else {
                            self.flush_residual();
                            return Ok(());
                        }
                    }
                },
                State::Waiting => match self.wait()? {
                    WaitStep::Read => State::Reading,
                    WaitStep::Reopen => State::Opening,
                    WaitStep::Closed => return Ok(()),
                    WaitStep::Stopped => return Ok(()),
                },
            };
        }
    }

    /// Open (or reopen) the file at the path. The starting location is
    /// honoured only on the very first open; reopens after rotation or
    /// truncation always start at offset 0, and the assembler residual
    /// from the previous file is discarded.
    fn open(&mut self) -> Result<Opened, TailError> {
        self.file = None;
        let file = loop {
            if self.shared.cancelled() {
                return Ok(Opened::Stopped);
            }
            match File::open(&self.path) {
                Ok(f) => break f,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %self.path.display(), "Waiting for file to appear");
                    match self.wait_until_exists()? {
                        Change::Cancelled => return Ok(Opened::Stopped),
                        _ => continue,
                    }
                }
                Err(source) => {
                    return Err(TailError::Io {
                        path: self.path.clone(),
                        operation: "open",
                        source,
                    })
                }
            }
        };

        let md = file.metadata().map_err(|source| TailError::Io {
            path: self.path.clone(),
            operation: "fstat",
            source,
        })?;
        self.identity = identity_of_metadata(&md);

        let start = if self.first_open {
            self.config
                .location
                .map(|loc| loc.resolve(md.len()))
                .unwrap_or(0)
        } else {
            0
        };
        self.first_open = false;

        let mut file = file;
        if start > 0 {
            file.seek(SeekFrom::Start(start))
                .map_err(|source| TailError::Io {
                    path: self.path.clone(),
                    operation: "seek",
                    source,
                })?;
        }

        self.offset = start;
        self.shared.store_offset(start);
        self.assembler.reset(start);
        self.file = Some(file);

        tracing::debug!(
            path = %self.path.display(),
            inode = self.identity.inode,
            offset = start,
            "Opened file for tailing"
        );
        Ok(Opened::Ready)
    }

    /// Read one chunk and emit every record it completes.
    fn read_step(&mut self) -> Result<ReadStep, TailError> {
        if self.shared.cancelled() {
            return Ok(ReadStep::Stopped);
        }
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Ok(ReadStep::Eof),
        };

        let n = file.read(&mut self.chunk).map_err(|source| TailError::Io {
            path: self.path.clone(),
            operation: "read",
            source,
        })?;
        if n == 0 {
            return Ok(ReadStep::Eof);
        }

        self.offset += n as u64;
        let lines = self.assembler.feed(&self.chunk[..n]);
        for line in lines {
            let end = line.end;
            match self.send(self.file_record(line)) {
                SendOutcome::Sent => self.shared.store_offset(end),
                SendOutcome::Stopped => return Ok(ReadStep::Stopped),
            }

            let pause = match self.config.rate_limiter.as_mut() {
                Some(limiter) => {
                    if !limiter.pour(1) {
                        Some(limiter.cool_off())
                    } else {
                        None
                    }
                }
                None => None,
            };
            if let Some(pause) = pause {
                if let ReadStep::Stopped = self.throttle(pause)? {
                    return Ok(ReadStep::Stopped);
                }
                // Everything assembled but not yet sent belongs to the
                // skipped backlog.
                return Ok(ReadStep::Progress);
            }
        }
        Ok(ReadStep::Progress)
    }

    /// Rate-limit episode: one synthetic notice, a cool-off pause, then
    /// skip the backlog by seeking to the current end of file.
    fn throttle(&mut self, pause: Duration) -> Result<ReadStep, TailError> {
        tracing::info!(
            path = %self.path.display(),
            pause_ms = pause.as_millis() as u64,
            "Rate limit engaged; pausing tail"
        );
        let notice = Record {
            text: RATE_LIMIT_NOTICE.to_string(),
            position: POSITION_NONE,
            inode: self.identity.inode,
            time: Utc::now(),
            error: None,
        };
        if let SendOutcome::Stopped = self.send(notice) {
            return Ok(ReadStep::Stopped);
        }
        if sleep_interruptible(self.shared.cancel_flag(), pause) {
            return Ok(ReadStep::Stopped);
        }

        if let Some(file) = self.file.as_mut() {
            let size = file
                .seek(SeekFrom::End(0))
                .map_err(|source| TailError::Io {
                    path: self.path.clone(),
                    operation: "seek",
                    source,
                })?;
            self.offset = size;
            self.shared.store_offset(size);
            self.assembler.reset(size);
            tracing::debug!(
                path = %self.path.display(),
                offset = size,
                "Skipped throttled backlog to end of file"
            );
        }
        Ok(ReadStep::Progress)
    }

    /// Park on the change source until something happens to the file.
    fn wait(&mut self) -> Result<WaitStep, TailError> {
        let change = self.wait_for_change()?;
        match change {
            Change::Grew | Change::Appeared => Ok(WaitStep::Read),
            Change::Truncated => {
                tracing::info!(
                    path = %self.path.display(),
                    old_offset = self.offset,
                    "File truncated in place; restarting from offset 0"
                );
                Ok(WaitStep::Reopen)
            }
            Change::Rotated => {
                if self.config.reopen {
                    tracing::info!(path = %self.path.display(), "File rotated; reopening");
                    Ok(WaitStep::Reopen)
                } else {
                    tracing::debug!(path = %self.path.display(), "File rotated; closing");
                    Ok(WaitStep::Closed)
                }
            }
            Change::Deleted => {
                if self.config.reopen {
                    tracing::info!(
                        path = %self.path.display(),
                        "File removed; waiting for it to reappear"
                    );
                    Ok(WaitStep::Reopen)
                } else {
                    tracing::debug!(path = %self.path.display(), "File removed; closing");
                    Ok(WaitStep::Closed)
                }
            }
            Change::Cancelled => Ok(WaitStep::Stopped),
        }
    }

    fn wait_for_change(&mut self) -> Result<Change, TailError> {
        loop {
            match self.source.wait_for_change(self.offset, self.identity) {
                Ok(change) => return Ok(change),
                Err(e) => self.downgrade_or_fail(e)?,
            }
        }
    }

    fn wait_until_exists(&mut self) -> Result<Change, TailError> {
        loop {
            match self.source.block_until_exists() {
                Ok(change) => return Ok(change),
                Err(e) => self.downgrade_or_fail(e)?,
            }
        }
    }

    /// A watch failure downgrades the kernel-event source to polling once;
    /// any further failure is terminal.
    fn downgrade_or_fail(&mut self, error: WatchError) -> Result<(), TailError> {
        if self.downgraded || self.config.poll {
            return Err(TailError::Watch(error));
        }
        tracing::warn!(
            path = %self.path.display(),
            error = %error,
            "Kernel watcher failed; downgrading to polling"
        );
        self.source.close();
        self.source = Box::new(PollSource::new(
            self.path.clone(),
            Duration::from_millis(self.config.poll_interval_ms),
            self.shared.cancel_handle(),
        ));
        self.downgraded = true;
        Ok(())
    }

    /// Emit whatever the assembler still holds as a final, unterminated
    /// record. Only used on the clean EOF-without-follow exit.
    fn flush_residual(&mut self) {
        if let Some(line) = self.assembler.flush() {
            let end = line.end;
            if let SendOutcome::Sent = self.send(self.file_record(line)) {
                self.shared.store_offset(end);
            }
        }
    }

    fn file_record(&self, line: AssembledLine) -> Record {
        Record {
            text: line.text,
            position: line.position as i64,
            inode: self.identity.inode,
            time: Utc::now(),
            error: None,
        }
    }

    /// Hand a record to the bounded channel, honouring cancellation while
    /// the consumer applies backpressure. Once cancellation is requested,
    /// nothing further is emitted.
    fn send(&self, record: Record) -> SendOutcome {
        let mut pending = record;
        loop {
            if self.shared.cancelled() {
                return SendOutcome::Stopped;
            }
            match self.tx.try_send(pending) {
                Ok(()) => return SendOutcome::Sent,
                Err(TrySendError::Full(record)) => {
                    pending = record;
                    std::thread::sleep(Duration::from_millis(SEND_RETRY_INTERVAL_MS));
                }
                Err(TrySendError::Disconnected(_)) => return SendOutcome::Stopped,
            }
        }
    }

    /// Terminal bookkeeping: record the error (if any), release resources,
    /// and let the channel close by dropping the sender with the worker.
    fn finish(&mut self, result: Result<(), TailError>) {
        if let Err(error) = result {
            tracing::warn!(
                path = %self.path.display(),
                error = %error,
                "Tail terminated with error"
            );
            let error = Arc::new(error);
            self.shared.set_terminal_error(Arc::clone(&error));
            // Best effort: the consumer may be gone or the channel full.
            let _ = self.tx.try_send(Record {
                text: String::new(),
                position: POSITION_NONE,
                inode: self.identity.inode,
                time: Utc::now(),
                error: Some(error),
            });
        } else {
            tracing::debug!(path = %self.path.display(), "Tail closed");
        }
        self.source.close();
        self.file = None;
        self.shared.mark_closed();
    }
}

/// Build the configured change source. A kernel-watcher setup failure is
/// not fatal: the engine starts on the polling source instead and records
/// that its one downgrade has been spent.
fn make_source(
    path: &Path,
    config: &Config,
    shared: &Arc<Shared>,
    downgraded: &mut bool,
) -> Box<dyn ChangeSource> {
    let interval = Duration::from_millis(config.poll_interval_ms);
    if config.poll {
        return Box::new(PollSource::new(
            path.to_path_buf(),
            interval,
            shared.cancel_handle(),
        ));
    }
    match EventSource::new(path, shared.cancel_handle()) {
        Ok(source) => Box::new(source),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Kernel watcher unavailable; starting in polling mode"
            );
            *downgraded = true;
            Box::new(PollSource::new(
                path.to_path_buf(),
                interval,
                shared.cancel_handle(),
            ))
        }
    }
}
