// linetail - core/model.rs
//
// Data model: the emitted record, seek locations, and the engine
// configuration. These types are the shared vocabulary across all layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::ratelimit::RateLimiter;
use crate::util::constants;
use crate::util::error::{ConfigError, TailError};

/// Sentinel position carried by synthetic records (rate-limiter notices,
/// terminal-error markers) that do not correspond to file bytes.
pub const POSITION_NONE: i64 = -1;

// =============================================================================
// Record
// =============================================================================

/// One element of the output sequence: a logical line (or a size-capped
/// piece of one) read from the tailed file.
#[derive(Debug, Clone)]
pub struct Record {
    /// Line content, without the terminating LF or an optional preceding CR.
    pub text: String,

    /// Absolute byte offset of the record's first byte within the file it
    /// was read from, or [`POSITION_NONE`] for synthetic records.
    pub position: i64,

    /// Inode of the file the record was read from. Changes across a
    /// rotation; constant across truncation-in-place.
    pub inode: u64,

    /// When the engine emitted the record.
    pub time: DateTime<Utc>,

    /// Terminal error, present only on the final record of a failed engine.
    pub error: Option<Arc<TailError>>,
}

// =============================================================================
// Starting location
// =============================================================================

/// Reference point for a starting offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Whence {
    /// Offset counts forward from the beginning of the file.
    Start,
    /// Offset counts from the end of the file; negative values step back
    /// into the existing content.
    End,
}

/// Starting position for the very first open. Subsequent reopens (after a
/// rotation) always begin at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekInfo {
    pub offset: i64,
    pub whence: Whence,
}

impl SeekInfo {
    /// Resolve to an absolute byte offset given the file's current size.
    ///
    /// `Start` offsets may point past the current end of file (a persisted
    /// offset from a file that has since shrunk); the follow loop's
    /// truncation handling deals with that case. `End` offsets are clamped
    /// to the file's bounds.
    pub fn resolve(&self, size: u64) -> u64 {
        match self.whence {
            Whence::Start => self.offset.max(0) as u64,
            Whence::End => {
                let from_end = size as i64 + self.offset;
                from_end.clamp(0, size as i64) as u64
            }
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Engine configuration, supplied once at construction and immutable
/// thereafter.
///
/// Deserialises from TOML with every field optional, so embedding log
/// shippers can keep per-file tailing sections in their own config files:
///
/// ```toml
/// follow = true
/// reopen = true
/// max_line_size = 16384
/// location = { offset = 0, whence = "end" }
/// ```
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fail construction when the path does not exist. When false, the
    /// engine waits for the path to appear.
    pub must_exist: bool,

    /// Keep waiting for growth after reaching end-of-file. When false, the
    /// output sequence closes at end-of-file.
    pub follow: bool,

    /// On rotation (rename-away or unlink-then-recreate), reopen the new
    /// file at the path and continue from offset 0. When false, rotation
    /// closes the output sequence.
    pub reopen: bool,

    /// Use the stat-polling change source instead of kernel events.
    pub poll: bool,

    /// Starting position for the first open. `None` means start-of-file.
    pub location: Option<SeekInfo>,

    /// Records longer than this many bytes are cut into pieces of at most
    /// this size. Zero means unlimited.
    pub max_line_size: usize,

    /// Polling interval for the stat-based change source, in milliseconds.
    pub poll_interval_ms: u64,

    /// Optional token bucket gating record emission. Not part of the
    /// serialised form; wired up programmatically.
    #[serde(skip)]
    pub rate_limiter: Option<Box<dyn RateLimiter + Send>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            must_exist: false,
            follow: true,
            reopen: false,
            poll: false,
            location: None,
            max_line_size: 0,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            rate_limiter: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("must_exist", &self.must_exist)
            .field("follow", &self.follow)
            .field("reopen", &self.reopen)
            .field("poll", &self.poll)
            .field("location", &self.location)
            .field("max_line_size", &self.max_line_size)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|source| ConfigError::TomlParse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.follow);
        assert!(!config.reopen);
        assert_eq!(config.max_line_size, 0);
        assert_eq!(
            config.poll_interval_ms,
            constants::DEFAULT_POLL_INTERVAL_MS
        );
    }

    #[test]
    fn test_config_from_toml() {
        let config = Config::from_toml_str(
            r#"
            follow = true
            reopen = true
            poll = true
            max_line_size = 4096
            poll_interval_ms = 5
            location = { offset = -6, whence = "end" }
            "#,
        )
        .expect("parse");
        assert!(config.reopen);
        assert!(config.poll);
        assert_eq!(config.max_line_size, 4096);
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(
            config.location,
            Some(SeekInfo {
                offset: -6,
                whence: Whence::End
            })
        );
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = Config::from_toml_str("poll_interval_ms = 0");
        assert!(matches!(
            result,
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn test_seekinfo_resolution() {
        let size = 100;
        assert_eq!(
            SeekInfo {
                offset: 12,
                whence: Whence::Start
            }
            .resolve(size),
            12
        );
        // Start offsets may run past the current end of file.
        assert_eq!(
            SeekInfo {
                offset: 150,
                whence: Whence::Start
            }
            .resolve(size),
            150
        );
        assert_eq!(
            SeekInfo {
                offset: 0,
                whence: Whence::End
            }
            .resolve(size),
            100
        );
        assert_eq!(
            SeekInfo {
                offset: -6,
                whence: Whence::End
            }
            .resolve(size),
            94
        );
        // End offsets are clamped to the file bounds.
        assert_eq!(
            SeekInfo {
                offset: -200,
                whence: Whence::End
            }
            .resolve(size),
            0
        );
        assert_eq!(
            SeekInfo {
                offset: 10,
                whence: Whence::End
            }
            .resolve(size),
            100
        );
    }
}
