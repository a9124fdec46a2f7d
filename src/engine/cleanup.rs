// linetail - engine/cleanup.rs
//
// Process-wide registry of running engines, so a test suite can force-close
// anything a test left running. Not part of normal operation: engines
// deregister themselves by dropping out of the weak list when they close.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::engine::Shared;

static ENGINES: Mutex<Vec<Weak<Shared>>> = Mutex::new(Vec::new());

fn registry() -> MutexGuard<'static, Vec<Weak<Shared>>> {
    match ENGINES.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Track a newly constructed engine. Dead entries are pruned on the way in
/// so the list stays proportional to the number of live engines.
pub(crate) fn register(shared: &Arc<Shared>) {
    let mut engines = registry();
    engines.retain(|weak| weak.strong_count() > 0);
    engines.push(Arc::downgrade(shared));
}

/// Request cancellation of every engine still running in this process.
///
/// Returns immediately; the engines drain and close on their own worker
/// threads within their normal cancellation bound. Intended for test
/// teardown, where a forgotten `stop()` would otherwise leak a follow loop
/// for the rest of the process.
pub fn cleanup() {
    let mut engines = registry();
    let mut live = 0usize;
    engines.retain(|weak| {
        if let Some(shared) = weak.upgrade() {
            if !shared.is_closed() {
                shared.request_cancel();
                live += 1;
            }
        }
        false
    });
    if live > 0 {
        tracing::debug!(engines = live, "Cleanup requested cancellation of running tails");
    }
}

// =============================================================================
// Tests
// =============================================================================
