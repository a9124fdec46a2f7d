// linetail - lib.rs
//
// Library entry point.
//
// linetail turns a path into a lazy sequence of newline-delimited records
// drawn from the file's current and future contents while external producers
// append to, rotate, truncate or delete it. Each record carries the absolute
// byte offset of its first byte so a consumer can persist the offset and
// resume after a restart.
//
// Layering (leaves first): util -> platform -> core -> watch -> engine.
// `ratelimit` is a standalone collaborator consumed through a trait.

pub mod core;
pub mod engine;
pub mod platform;
pub mod ratelimit;
pub mod util;
pub mod watch;

pub use crate::core::model::{Config, Record, SeekInfo, Whence, POSITION_NONE};
pub use crate::engine::cleanup::cleanup;
pub use crate::engine::tail::Tail;
pub use crate::ratelimit::{LeakyBucket, RateLimiter};
pub use crate::util::error::TailError;
