use std::fmt;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::quantum;
use crate::time::Clock;
use crate::time::MonotonicClock;
use crate::time::duration_from_nanos;
use crate::time::nanos_since;

/// Token bucket rate limiter with lazy, tick-based refill
///
/// Time since construction is divided into ticks of `fill_interval`, and
/// each tick credits `quantum` tokens up to `capacity`. Nothing runs in the
/// background: the balance is brought up to date whenever the bucket is
/// touched.
///
/// [`take`](RateLimiter::take) may push the balance below zero. That debt
/// reserves future ticks for the caller, who is told how long to wait
/// before the reserved tokens are earned. Concurrent callers therefore
/// queue behind each other's reservations instead of all claiming the same
/// refill.
///
/// All accounting happens under one short critical section and runs in
/// constant time.
pub struct TokenBucket<C: Clock = MonotonicClock> {
    /// Clock reading at construction, tick zero
    start_time: Instant,

    /// Wall-clock length of one tick
    fill_interval: Duration,

    /// `fill_interval` in nanoseconds, never zero
    fill_nanos: u128,

    /// Tokens credited per tick
    quantum: i64,

    /// Maximum number of stored tokens
    capacity: i64,

    state: Mutex<BucketState>,

    clock: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketState {
    /// Current balance, negative while in debt
    available_tokens: i64,

    /// Tick at which `available_tokens` was last refreshed
    latest_tick: i64,
}

impl TokenBucket<MonotonicClock> {
    /// Create a bucket crediting `quantum` tokens every `fill_interval`
    pub fn new(fill_interval: Duration, quantum: i64, capacity: i64) -> Result<Self> {
        Self::with_clock(fill_interval, quantum, capacity, MonotonicClock)
    }

    /// Create a bucket approximating `rate` tokens per second
    ///
    /// The derived [`rate`](RateLimiter::rate) is within
    /// [`RATE_MARGIN`](crate::quantum::RATE_MARGIN) of the requested one.
    pub fn with_rate(rate: f64, capacity: i64) -> Result<Self> {
        Self::with_rate_and_clock(rate, capacity, MonotonicClock)
    }

    /// Create a builder for configuring a token bucket
    pub fn builder() -> TokenBucketBuilder {
        TokenBucketBuilder::new()
    }
}

impl<C: Clock> TokenBucket<C> {
    pub fn with_clock(fill_interval: Duration, quantum: i64, capacity: i64, clock: C) -> Result<Self> {
        if fill_interval.is_zero() {
            return Err(RateLimitError::InvalidArgument("fill interval must be greater than 0"));
        }
        if quantum <= 0 {
            return Err(RateLimitError::InvalidArgument("quantum must be greater than 0"));
        }
        if capacity <= 0 {
            return Err(RateLimitError::InvalidArgument("capacity must be greater than 0"));
        }

        Ok(Self::from_parts(fill_interval, quantum, capacity, clock))
    }

    pub fn with_rate_and_clock(rate: f64, capacity: i64, clock: C) -> Result<Self> {
        if rate.is_nan() || rate <= 0.0 {
            return Err(RateLimitError::InvalidArgument("rate must be greater than 0"));
        }
        if capacity <= 0 {
            return Err(RateLimitError::InvalidArgument("capacity must be greater than 0"));
        }

        let (fill_interval, quantum) = quantum::find_quantum(rate)?;
        debug!(requested = rate, derived = quantum::rate_of(quantum, fill_interval), "Derived quantum {quantum} every {fill_interval:?}");

        Ok(Self::from_parts(fill_interval, quantum, capacity, clock))
    }

    fn from_parts(fill_interval: Duration, quantum: i64, capacity: i64, clock: C) -> Self {
        let start_time = clock.now();
        debug!(?fill_interval, quantum, capacity, "Token bucket created");

        Self {
            start_time,
            fill_interval,
            fill_nanos: fill_interval.as_nanos(),
            quantum,
            capacity,
            // Bucket starts full
            state: Mutex::new(BucketState { available_tokens: capacity, latest_tick: 0 }),
            clock,
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    pub fn quantum(&self) -> i64 {
        self.quantum
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// [`take`](RateLimiter::take) evaluated at `now`
    ///
    /// `None` for `max_wait` means no deadline: the request always commits.
    pub fn take_at(&self, now: Instant, count: i64, max_wait: Option<Duration>) -> Duration {
        let mut state = self.state.lock();
        self.take_locked(&mut state, now, count, max_wait)
    }

    /// [`take_available`](RateLimiter::take_available) evaluated at `now`
    pub fn take_available_at(&self, now: Instant, count: i64) -> i64 {
        let mut state = self.state.lock();
        self.take_available_locked(&mut state, now, count)
    }

    /// [`available`](RateLimiter::available) evaluated at `now`
    pub fn available_at(&self, now: Instant) -> i64 {
        let mut state = self.state.lock();
        self.adjust_available_tokens(&mut state, self.current_tick(now));
        state.available_tokens
    }

    /// Index of the tick containing `now`
    #[inline]
    fn current_tick(&self, now: Instant) -> i64 {
        let tick = nanos_since(self.start_time, now) / self.fill_nanos;
        i64::try_from(tick).unwrap_or(i64::MAX)
    }

    /// Credit the ticks elapsed since the last refresh
    ///
    /// The stored tick moves forward to `tick` even when the bucket is full,
    /// so a tick is never credited twice and ticks that pass while full are
    /// dropped. An earlier `tick` leaves the state alone.
    #[inline]
    fn adjust_available_tokens(&self, state: &mut BucketState, tick: i64) {
        let last_tick = state.latest_tick;
        if tick <= last_tick {
            return;
        }
        state.latest_tick = tick;

        if state.available_tokens >= self.capacity {
            return;
        }

        let refill = (tick - last_tick) as i128 * self.quantum as i128;
        let refilled = (state.available_tokens as i128 + refill).min(self.capacity as i128);
        state.available_tokens = refilled as i64;
    }

    fn take_available_locked(&self, state: &mut BucketState, now: Instant, count: i64) -> i64 {
        if count <= 0 {
            return 0;
        }

        self.adjust_available_tokens(state, self.current_tick(now));
        if state.available_tokens <= 0 {
            return 0;
        }

        let granted = count.min(state.available_tokens);
        state.available_tokens -= granted;
        granted
    }

    fn take_locked(&self, state: &mut BucketState, now: Instant, count: i64, max_wait: Option<Duration>) -> Duration {
        if count <= 0 {
            return Duration::ZERO;
        }

        let tick = self.current_tick(now);
        self.adjust_available_tokens(state, tick);

        let Some(avail) = state.available_tokens.checked_sub(count) else {
            trace!(count, "Debt would overflow, not committing");
            return Duration::MAX;
        };
        if avail >= 0 {
            state.available_tokens = avail;
            return Duration::ZERO;
        }

        // Ticks needed for future refills to cover the deficit, counted from
        // the last credited tick when `now` is older than it
        let quantum = self.quantum as i128;
        let extra_ticks = (-(avail as i128) + quantum - 1) / quantum;
        let end_tick = (state.latest_tick.max(tick) as i128 + extra_ticks) as u128;
        let end_nanos = end_tick.saturating_mul(self.fill_nanos);
        let wait = duration_from_nanos(end_nanos.saturating_sub(nanos_since(self.start_time, now)));

        if let Some(max_wait) = max_wait {
            if wait > max_wait {
                trace!(count, ?wait, ?max_wait, "Deadline cannot be met, not committing");
                return wait;
            }
        }

        state.available_tokens = avail;
        wait
    }
}

impl<C: Clock> RateLimiter for TokenBucket<C> {
    fn take(&self, count: i64) -> Duration {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.take_locked(&mut state, now, count, None)
    }

    fn take_available(&self, count: i64) -> i64 {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.take_available_locked(&mut state, now, count)
    }

    fn available(&self) -> i64 {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.adjust_available_tokens(&mut state, self.current_tick(now));
        state.available_tokens
    }

    fn take_max_duration(&self, count: i64, max_wait: Duration) -> Duration {
        let mut state = self.state.lock();
        let now = self.clock.now();
        self.take_locked(&mut state, now, count, Some(max_wait))
    }

    fn rate(&self) -> f64 {
        quantum::rate_of(self.quantum, self.fill_interval)
    }
}

impl<C: Clock> fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("fill_interval", &self.fill_interval)
            .field("quantum", &self.quantum)
            .field("capacity", &self.capacity)
            .field("rate", &self.rate())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a token bucket
///
/// A bucket is either described by its tick (`fill_interval` plus
/// `quantum`, which defaults to 1) or by a target rate. When a rate is set
/// it takes precedence.
#[derive(Debug, Clone, Default)]
pub struct TokenBucketBuilder {
    capacity: Option<i64>,
    fill_interval: Option<Duration>,
    quantum: Option<i64>,
    rate: Option<f64>,
}

impl TokenBucketBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bucket capacity (max tokens)
    pub fn capacity(mut self, capacity: i64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the length of one refill tick
    pub fn fill_interval(mut self, fill_interval: Duration) -> Self {
        self.fill_interval = Some(fill_interval);
        self
    }

    /// Set the number of tokens credited per tick
    pub fn quantum(mut self, quantum: i64) -> Self {
        self.quantum = Some(quantum);
        self
    }

    /// Set the refill rate in tokens per second
    pub fn rate_per_second(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set rate in tokens per minute
    pub fn rate_per_minute(mut self, rate: f64) -> Self {
        self.rate = Some(rate / 60.0);
        self
    }

    /// Build the token bucket on the monotonic clock
    pub fn build(self) -> Result<TokenBucket> {
        self.build_with_clock(MonotonicClock)
    }

    pub fn build_with_clock<C: Clock>(self, clock: C) -> Result<TokenBucket<C>> {
        let capacity = self.capacity.ok_or(RateLimitError::InvalidArgument("capacity must be set"))?;

        if let Some(rate) = self.rate {
            return TokenBucket::with_rate_and_clock(rate, capacity, clock);
        }

        let fill_interval = self.fill_interval.ok_or(RateLimitError::InvalidArgument("fill interval or rate must be set"))?;
        TokenBucket::with_clock(fill_interval, self.quantum.unwrap_or(1), capacity, clock)
    }
}
