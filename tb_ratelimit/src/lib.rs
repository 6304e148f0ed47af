//! # tb_ratelimit
//!
//! In-process token bucket rate limiter with lazy tick-based refill,
//! deadline-bounded reservations and best-effort admission.

pub mod config;
pub mod error;
pub mod limiter;
pub mod quantum;
pub mod time;
pub mod token_bucket;

pub use config::BucketConfig;
pub use error::RateLimitError;
pub use error::Result;
pub use limiter::RateLimiter;
pub use time::Clock;
pub use time::ManualClock;
pub use time::MonotonicClock;
pub use token_bucket::TokenBucket;
pub use token_bucket::TokenBucketBuilder;
