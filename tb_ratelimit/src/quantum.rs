//! Conversion between a floating-point rate and an integer tick schedule
//!
//! A bucket refills `quantum` tokens once per `fill_interval`, both integers
//! (the interval in nanoseconds). An arbitrary rate is approximated by the
//! smallest quantum whose rounded interval lands within [`RATE_MARGIN`].

use std::time::Duration;

use crate::error::RateLimitError;
use crate::error::Result;

/// Maximum relative error tolerated between requested and derived rate
pub const RATE_MARGIN: f64 = 0.01;

/// Upper bound of the quantum search
pub const MAX_QUANTUM: i64 = 1 << 50;

const NANOS_PER_SEC: f64 = 1e9;

/// Tokens per second produced by `quantum` tokens every `fill_interval`
#[inline]
pub fn rate_of(quantum: i64, fill_interval: Duration) -> f64 {
    NANOS_PER_SEC * quantum as f64 / fill_interval.as_nanos() as f64
}

/// Grow the quantum by roughly 10%, always by at least one
#[inline]
pub(crate) fn next_quantum(quantum: i64) -> i64 {
    (quantum * 11 / 10).max(quantum + 1)
}

/// Find `(fill_interval, quantum)` approximating `rate` tokens per second
pub(crate) fn find_quantum(rate: f64) -> Result<(Duration, i64)> {
    let mut quantum: i64 = 1;
    while quantum < MAX_QUANTUM {
        let fill_nanos = (NANOS_PER_SEC * quantum as f64 / rate).round();

        // Intervals that round to nothing (or past u64 nanos) are unrepresentable
        if fill_nanos >= 1.0 && fill_nanos < u64::MAX as f64 {
            let fill_interval = Duration::from_nanos(fill_nanos as u64);
            let diff = (rate_of(quantum, fill_interval) - rate).abs();
            if diff / rate <= RATE_MARGIN {
                return Ok((fill_interval, quantum));
            }
        }

        quantum = next_quantum(quantum);
    }

    Err(RateLimitError::NoSuitableQuantum { rate })
}
