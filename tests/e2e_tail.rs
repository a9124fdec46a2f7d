// linetail - tests/e2e_tail.rs
//
// End-to-end tests for the tailing engine.
//
// These tests exercise the real filesystem: real files, real appends,
// real renames, removes and in-place truncations, and both change-source
// modes — no mocks, no stubs. Timings use generous receive timeouts and
// short quiet intervals so the suite is fast without being racy.
//
// Scenarios that rotate or truncate the file consume records on a scoped
// collector thread while the main thread performs the file dance; the
// bounded output channel would otherwise stall the worker and let it miss
// intermediate generations of the file.

use linetail::platform::fs::identity_of_path;
use linetail::{cleanup, Config, LeakyBucket, Record, SeekInfo, Tail, TailError, Whence, POSITION_NONE};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

/// How long to wait for any single record before declaring the test failed.
const RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// Quiet interval between filesystem mutations, long enough for the engine
/// to observe the previous state.
const QUIET: Duration = Duration::from_millis(200);

/// Poll interval used by every polling-mode test (ms).
const FAST_POLL_MS: u64 = 5;

struct TailFixture {
    dir: TempDir,
}

impl TailFixture {
    fn new() -> Self {
        linetail::util::logging::init();
        Self {
            dir: TempDir::new().expect("tmpdir"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn create(&self, name: &str, contents: &str) {
        fs::write(self.path(name), contents).expect("create file");
    }

    fn append(&self, name: &str, contents: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path(name))
            .expect("open for append");
        file.write_all(contents.as_bytes()).expect("append");
    }

    /// Truncate in place and rewrite: same inode, new content.
    fn overwrite(&self, name: &str, contents: &str) {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path(name))
            .expect("open for truncate");
        file.write_all(contents.as_bytes()).expect("rewrite");
    }

    fn rename(&self, old: &str, new: &str) {
        fs::rename(self.path(old), self.path(new)).expect("rename");
    }

    fn remove(&self, name: &str) {
        fs::remove_file(self.path(name)).expect("remove");
    }

    fn inode(&self, name: &str) -> u64 {
        identity_of_path(&self.path(name)).expect("stat").inode
    }

    fn start(&self, name: &str, config: Config) -> Tail {
        Tail::file(self.path(name), config).expect("start tail")
    }
}

/// Receive and check `expected` records of `(text, position, inode)`.
fn expect_records(tail: &Tail, expected: &[(&str, i64, u64)]) {
    for (idx, (text, position, inode)) in expected.iter().enumerate() {
        let record = recv(tail, idx);
        assert_eq!(record.text, *text, "record {idx} text");
        assert_eq!(record.position, *position, "record {idx} position");
        assert_eq!(record.inode, *inode, "record {idx} inode");
    }
}

fn recv(tail: &Tail, idx: usize) -> Record {
    tail.lines
        .recv_timeout(RECORD_TIMEOUT)
        .unwrap_or_else(|e| panic!("record {idx}: {e}"))
}

/// Collect exactly `count` records; panics if the sequence closes or
/// stalls first.
fn collect_records(tail: &Tail, count: usize) -> Vec<Record> {
    (0..count).map(|idx| recv(tail, idx)).collect()
}

/// The sequence must close without yielding further records.
fn expect_closed(tail: &Tail) {
    match tail.lines.recv_timeout(RECORD_TIMEOUT) {
        Err(RecvTimeoutError::Disconnected) => {}
        Ok(record) => panic!("unexpected record after close: {:?}", record.text),
        Err(e) => panic!("sequence did not close: {e}"),
    }
}

// =============================================================================
// Construction and shutdown
// =============================================================================

/// must_exist governs whether a missing path fails construction.
#[test]
fn e2e_must_exist() {
    let fixture = TailFixture::new();

    let missing = fixture.path("no-such-file");
    let result = Tail::file(
        &missing,
        Config {
            must_exist: true,
            ..Config::default()
        },
    );
    assert!(
        matches!(result, Err(TailError::Io { .. })),
        "must_exist on a missing path should fail construction"
    );

    let tail = Tail::file(
        &missing,
        Config {
            must_exist: false,
            poll: true,
            poll_interval_ms: FAST_POLL_MS,
            ..Config::default()
        },
    )
    .expect("must_exist=false waits for the path");
    tail.stop().expect("stop");

    fixture.create("test.txt", "hello\n");
    let tail = fixture.start(
        "test.txt",
        Config {
            must_exist: true,
            ..Config::default()
        },
    );
    assert_eq!(tail.path(), fixture.path("test.txt"));
    tail.stop().expect("stop");
    cleanup();
}

/// stop() is idempotent and closes the sequence promptly even when the
/// engine is parked waiting for a file that never appears.
#[test]
fn e2e_stop_is_idempotent() {
    let fixture = TailFixture::new();
    let tail = Tail::file(
        fixture.path("never-created"),
        Config {
            poll: true,
            poll_interval_ms: FAST_POLL_MS,
            ..Config::default()
        },
    )
    .expect("start");

    tail.stop().expect("first stop");
    tail.stop().expect("second stop");
    expect_closed(&tail);
    assert!(tail.err().is_none());
    cleanup();
}

// =============================================================================
// Line assembly through the engine
// =============================================================================

/// Records longer than max_line_size are cut into exact-size pieces with
/// positions advancing by the cap; the unterminated tail of the file is
/// flushed on the clean end-of-file exit.
#[test]
fn e2e_max_line_size() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\nfin\nhe");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: false,
            max_line_size: 3,
            ..Config::default()
        },
    );
    expect_records(
        &tail,
        &[
            ("hel", 0, inode),
            ("lo", 3, inode),
            ("wor", 6, inode),
            ("ld", 9, inode),
            ("fin", 12, inode),
            ("he", 16, inode),
        ],
    );
    expect_closed(&tail);
    tail.stop().expect("stop");
    cleanup();
}

/// A line longer than the read chunk is assembled whole, and the records
/// after it keep byte-accurate positions.
#[test]
fn e2e_over_4096_byte_line() {
    let fixture = TailFixture::new();
    let long = "a".repeat(4097);
    fixture.create("test.txt", &format!("test\n{long}\nhello\nworld\n"));
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: false,
            ..Config::default()
        },
    );
    expect_records(
        &tail,
        &[
            ("test", 0, inode),
            (long.as_str(), 5, inode),
            ("hello", 4103, inode),
            ("world", 4109, inode),
        ],
    );
    expect_closed(&tail);
    tail.stop().expect("stop");
    cleanup();
}

/// follow=false flushes a partial last line before closing.
#[test]
fn e2e_no_follow_flushes_partial_line() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nwor");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: false,
            ..Config::default()
        },
    );
    expect_records(&tail, &[("hello", 0, inode), ("wor", 6, inode)]);
    expect_closed(&tail);
    tail.stop().expect("stop");
    cleanup();
}

// =============================================================================
// Starting locations
// =============================================================================

/// location = {0, end} skips the existing content and reports appended
/// records at their true offsets.
#[test]
fn e2e_location_end() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\n");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            location: Some(SeekInfo {
                offset: 0,
                whence: Whence::End,
            }),
            ..Config::default()
        },
    );

    std::thread::sleep(QUIET);
    fixture.append("test.txt", "more\ndata\n");

    expect_records(&tail, &[("more", 12, inode), ("data", 17, inode)]);
    tail.stop().expect("stop");
    cleanup();
}

/// A negative end-relative offset starts mid-file.
#[test]
fn e2e_location_middle() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\n");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            location: Some(SeekInfo {
                offset: -6,
                whence: Whence::End,
            }),
            ..Config::default()
        },
    );

    std::thread::sleep(QUIET);
    fixture.append("test.txt", "more\ndata\n");

    expect_records(
        &tail,
        &[("world", 6, inode), ("more", 12, inode), ("data", 17, inode)],
    );
    tail.stop().expect("stop");
    cleanup();
}

/// tell() returns a resumable offset: reopening at it continues at (or one
/// record past) the first unconsumed record.
#[test]
fn e2e_tell_and_resume() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\nagain\nmore\n");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: false,
            location: Some(SeekInfo {
                offset: 0,
                whence: Whence::Start,
            }),
            ..Config::default()
        },
    );
    let first = recv(&tail, 0);
    assert_eq!(first.text, "hello");
    let offset = tail.tell().expect("tell");
    tail.done();

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: false,
            location: Some(SeekInfo {
                offset: offset as i64,
                whence: Whence::Start,
            }),
            ..Config::default()
        },
    );
    let next = recv(&tail, 0);
    // One record may have been in flight when the first engine was told to
    // stop, so resumption lands on either of the two candidates.
    assert!(
        next.text == "world" || next.text == "again",
        "expected world or again, got {:?}",
        next.text
    );
    tail.done();
    cleanup();
}

// =============================================================================
// Rotation and truncation
// =============================================================================

fn reopen_scenario(poll: bool) {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\n");
    let inode_first = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            reopen: true,
            poll,
            poll_interval_ms: FAST_POLL_MS,
            ..Config::default()
        },
    );

    let (records, inode_second, inode_third) = std::thread::scope(|s| {
        let collector = s.spawn(|| collect_records(&tail, 5));

        // Deletion must trigger reopen.
        std::thread::sleep(QUIET);
        fixture.remove("test.txt");
        std::thread::sleep(QUIET);
        fixture.create("test.txt", "more\ndata\n");
        let inode_second = fixture.inode("test.txt");

        // Rename must trigger reopen.
        std::thread::sleep(QUIET);
        fixture.rename("test.txt", "test.txt.rotated");
        std::thread::sleep(QUIET);
        fixture.create("test.txt", "endofworld\n");
        let inode_third = fixture.inode("test.txt");

        (collector.join().expect("collector"), inode_second, inode_third)
    });

    let got: Vec<(&str, i64, u64)> = records
        .iter()
        .map(|r| (r.text.as_str(), r.position, r.inode))
        .collect();
    assert_eq!(
        got,
        vec![
            ("hello", 0, inode_first),
            ("world", 6, inode_first),
            ("more", 0, inode_second),
            ("data", 5, inode_second),
            ("endofworld", 0, inode_third),
        ]
    );

    tail.stop().expect("stop");
    cleanup();
}

/// Rotation by remove/recreate and by rename, kernel-event mode: every
/// generation of the file is read from offset 0 under its own inode.
#[test]
fn e2e_reopen_events() {
    reopen_scenario(false);
}

/// Same rotation scenario detected by the polling source, inode checks
/// included.
#[test]
fn e2e_reopen_polling() {
    reopen_scenario(true);
}

fn truncate_scenario(poll: bool) {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "a really long string goes here\nhello\nworld\n");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            reopen: false,
            poll,
            poll_interval_ms: FAST_POLL_MS,
            ..Config::default()
        },
    );

    let records = std::thread::scope(|s| {
        let collector = s.spawn(|| collect_records(&tail, 6));

        std::thread::sleep(QUIET);
        fixture.overwrite("test.txt", "h311o\nw0r1d\nendofworld\n");

        collector.join().expect("collector")
    });

    let got: Vec<(&str, i64, u64)> = records
        .iter()
        .map(|r| (r.text.as_str(), r.position, r.inode))
        .collect();
    assert_eq!(
        got,
        vec![
            ("a really long string goes here", 0, inode),
            ("hello", 31, inode),
            ("world", 37, inode),
            ("h311o", 0, inode),
            ("w0r1d", 6, inode),
            ("endofworld", 12, inode),
        ]
    );

    tail.stop().expect("stop");
    cleanup();
}

/// Truncation-in-place restarts reading from offset 0 under the same
/// inode, even with reopen disabled, kernel-event mode.
#[test]
fn e2e_truncate_events() {
    truncate_scenario(false);
}

/// Same truncation scenario detected by the polling source.
#[test]
fn e2e_truncate_polling() {
    truncate_scenario(true);
}

// =============================================================================
// Rate limiting
// =============================================================================

/// When the bucket rejects, the engine emits one synthetic notice, pauses,
/// and skips the throttled backlog: the next real record comes from the
/// end of file at the time of throttling.
#[test]
fn e2e_rate_limiting() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\nworld\nagain\nextra\n");
    let inode = fixture.inode("test.txt");
    let notice = "Too much log activity; waiting a second before resuming tailing";

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            rate_limiter: Some(Box::new(LeakyBucket::new(2, Duration::from_secs(1)))),
            ..Config::default()
        },
    );

    let records = std::thread::scope(|s| {
        let collector = s.spawn(|| collect_records(&tail, 7));

        std::thread::sleep(Duration::from_millis(1200));
        fixture.append("test.txt", "more\ndata\n");

        collector.join().expect("collector")
    });

    let got: Vec<(&str, i64, u64)> = records
        .iter()
        .map(|r| (r.text.as_str(), r.position, r.inode))
        .collect();
    assert_eq!(
        got,
        vec![
            ("hello", 0, inode),
            ("world", 6, inode),
            ("again", 12, inode),
            (notice, POSITION_NONE, inode),
            ("more", 24, inode),
            ("data", 29, inode),
            (notice, POSITION_NONE, inode),
        ]
    );

    tail.stop().expect("stop");
    cleanup();
}

// =============================================================================
// Process-wide cleanup
// =============================================================================

/// cleanup() force-closes engines a test forgot to stop.
#[test]
fn e2e_cleanup_closes_forgotten_engines() {
    let fixture = TailFixture::new();
    fixture.create("test.txt", "hello\n");
    let inode = fixture.inode("test.txt");

    let tail = fixture.start(
        "test.txt",
        Config {
            follow: true,
            poll: true,
            poll_interval_ms: FAST_POLL_MS,
            ..Config::default()
        },
    );
    expect_records(&tail, &[("hello", 0, inode)]);

    cleanup();
    expect_closed(&tail);
    assert!(tail.err().is_none());
}
