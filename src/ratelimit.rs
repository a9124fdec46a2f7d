// linetail - ratelimit.rs
//
// Leaky-bucket rate limiting for record emission.
//
// The engine consumes the limiter through the `RateLimiter` trait: one
// `pour` per emitted record, and a cool-off pause when the bucket rejects.
// The limiter itself knows nothing about files or records.

use std::time::{Duration, Instant};

/// Token-bucket interface consumed by the follow loop.
///
/// `pour` accounts one or more units of work and reports whether the
/// bucket accepted them. A `false` return is the signal to pause emission.
pub trait RateLimiter: Send {
    /// Account `amount` units. Returns false when the bucket would overflow.
    fn pour(&mut self, amount: u64) -> bool;

    /// How long the engine should pause after a rejected pour before it
    /// resumes tailing.
    fn cool_off(&self) -> Duration;
}

/// A leaky bucket: capacity `capacity` units, draining one unit every
/// `leak_interval`.
///
/// Pours fill the bucket; time drains it. Once `fill + amount` would exceed
/// the capacity the pour is rejected and the fill is left untouched, so a
/// rejected burst does not extend the penalty.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: u64,
    fill: u64,
    leak_interval: Duration,
    last_leak: Instant,
}

impl LeakyBucket {
    /// Create a bucket holding `capacity` units that leaks one unit every
    /// `leak_interval`. A zero interval is clamped to one millisecond so the
    /// leak arithmetic stays well-defined.
    pub fn new(capacity: u64, leak_interval: Duration) -> Self {
        Self {
            capacity,
            fill: 0,
            leak_interval: leak_interval.max(Duration::from_millis(1)),
            last_leak: Instant::now(),
        }
    }

    /// Current fill level, after applying any pending leak.
    pub fn fill(&mut self) -> u64 {
        self.leak();
        self.fill
    }

    fn leak(&mut self) {
        let elapsed = self.last_leak.elapsed();
        let leaked = (elapsed.as_nanos() / self.leak_interval.as_nanos()) as u64;
        if leaked == 0 {
            return;
        }
        if leaked >= self.fill {
            self.fill = 0;
            self.last_leak = Instant::now();
        } else {
            self.fill -= leaked;
            // Keep the fractional remainder of the elapsed time so leak
            // timing does not drift across calls.
            self.last_leak += self.leak_interval * (leaked as u32);
        }
    }
}

impl RateLimiter for LeakyBucket {
    fn pour(&mut self, amount: u64) -> bool {
        self.leak();
        if self.fill + amount > self.capacity {
            return false;
        }
        self.fill += amount;
        true
    }

    fn cool_off(&self) -> Duration {
        Duration::from_secs(1)
    }
}

// =============================================================================
// Tests
// =============================================================================
