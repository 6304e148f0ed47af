use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Source of monotonic time readings for a bucket
///
/// The bucket never derives time on its own, it only consumes `now()`.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default clock backed by `Instant::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock for tests and simulations
///
/// Readings are a fixed base instant plus an offset that only moves when
/// `advance` or `set_elapsed` is called. Clones share the same offset.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset_nanos: Arc::new(AtomicU64::new(0)) }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self.offset_nanos.fetch_update(Ordering::AcqRel, Ordering::Acquire, |offset| Some(offset.saturating_add(by)));
    }

    /// Set the total elapsed time since the clock was created
    pub fn set_elapsed(&self, elapsed: Duration) {
        self.offset_nanos.store(saturating_nanos(elapsed), Ordering::Release);
    }

    /// Total elapsed time since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::Acquire))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline(always)]
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Nanoseconds from `start` to `now`, zero if `now` precedes `start`
#[inline(always)]
pub(crate) fn nanos_since(start: Instant, now: Instant) -> u128 {
    now.saturating_duration_since(start).as_nanos()
}

/// Convert nanoseconds to a duration, saturating at `Duration::MAX`
#[inline(always)]
pub(crate) fn duration_from_nanos(nanos: u128) -> Duration {
    let secs = nanos / NANOS_PER_SEC;
    if secs > u64::MAX as u128 {
        return Duration::MAX;
    }
    Duration::new(secs as u64, (nanos % NANOS_PER_SEC) as u32)
}

#[inline(always)]
fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock() {
        let clock = MonotonicClock;
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_manual_clock_only_moves_when_told() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(250));

        clock.set_elapsed(Duration::from_millis(60));
        assert_eq!(clock.now() - t0, Duration::from_millis(60));
    }

    #[test]
    fn test_manual_clock_clones_share_offset() {
        let clock = ManualClock::new();
        let shared = clock.clone();

        shared.advance(Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new();
        clock.set_elapsed(Duration::from_nanos(u64::MAX - 5));
        clock.advance(Duration::from_nanos(10));
        assert_eq!(clock.elapsed(), Duration::from_nanos(u64::MAX));

        clock.advance(Duration::MAX);
        assert_eq!(clock.elapsed(), Duration::from_nanos(u64::MAX));
    }

    #[test]
    fn test_conversions() {
        let start = Instant::now();
        assert_eq!(nanos_since(start, start + Duration::from_micros(7)), 7_000);
        assert_eq!(nanos_since(start + Duration::from_secs(1), start), 0);

        assert_eq!(duration_from_nanos(1_500_000_000), Duration::from_millis(1500));
        assert_eq!(duration_from_nanos(u128::MAX), Duration::MAX);
    }
}
