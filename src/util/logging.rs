// linetail - util/logging.rs
//
// Structured logging setup for embedders and the test suite.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - Default level: "info"
//
// Output: stderr. The engine itself only ever *emits* through `tracing`
// macros; installing a subscriber is the embedding application's choice,
// and this helper is a convenience for binaries and tests that have not
// set one up.

use tracing_subscriber::EnvFilter;

/// Default log level when RUST_LOG is not set.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Initialise the logging subsystem.
///
/// Safe to call more than once: later calls are no-ops if a global
/// subscriber is already installed (test binaries call this from every
/// test function).
pub fn init() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
