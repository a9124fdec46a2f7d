// linetail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation. All errors preserve the causal chain
// for diagnostic logging and for the caller's `err()` query.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all linetail operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum TailError {
    /// Configuration validation or loading failed.
    Config(ConfigError),

    /// The change-notification layer failed.
    Watch(WatchError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Watch(e) => write!(f, "Watch error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Watch(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for TailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<WatchError> for TailError {
    fn from(e: WatchError) -> Self {
        Self::Watch(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors related to tailing configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML text could not be parsed into a `Config`.
    TomlParse { source: toml::de::Error },

    /// The polling interval is zero; the polling change source would spin.
    ZeroPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { source } => write!(f, "invalid TOML: {source}"),
            Self::ZeroPollInterval => write!(f, "poll_interval_ms must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source } => Some(source),
            Self::ZeroPollInterval => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Change-source errors
// ---------------------------------------------------------------------------

/// Errors produced by the change-notification layer (kernel events or
/// stat polling).
#[derive(Debug)]
pub enum WatchError {
    /// The kernel event watcher could not be created.
    Init { source: notify::Error },

    /// Registering the watched directory with the kernel watcher failed.
    Register {
        path: PathBuf,
        source: notify::Error,
    },

    /// The kernel event stream reported a backend failure.
    Backend { source: notify::Error },

    /// The kernel event stream closed unexpectedly (dropped events).
    EventsClosed { path: PathBuf },

    /// Stat on the watched path failed for a reason other than absence.
    Stat { path: PathBuf, source: io::Error },
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init { source } => write!(f, "cannot create file watcher: {source}"),
            Self::Register { path, source } => write!(
                f,
                "cannot watch directory of '{}': {source}",
                path.display()
            ),
            Self::Backend { source } => write!(f, "file watcher backend failed: {source}"),
            Self::EventsClosed { path } => write!(
                f,
                "file watcher event stream closed while watching '{}'",
                path.display()
            ),
            Self::Stat { path, source } => {
                write!(f, "cannot stat '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Init { source } => Some(source),
            Self::Register { source, .. } => Some(source),
            Self::Backend { source } => Some(source),
            Self::EventsClosed { .. } => None,
            Self::Stat { source, .. } => Some(source),
        }
    }
}
