use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Core trait for token-based rate limiting
///
/// Accounting methods never sleep. `wait*` methods sleep outside of any
/// internal lock, after the admission decision has been committed.
pub trait RateLimiter: Send + Sync {
    /// Take `count` tokens unconditionally, returning how long the caller
    /// must wait before the work they represent may proceed
    fn take(&self, count: i64) -> Duration;

    /// Take up to `count` tokens that are available right now, returning
    /// the number granted (possibly zero). Never blocks, never creates debt.
    fn take_available(&self, count: i64) -> i64;

    /// Current token balance after refill, negative when in debt
    fn available(&self) -> i64;

    /// Like [`take`](Self::take), but only commits when the wait is at most
    /// `max_wait`. A returned duration greater than `max_wait` means the
    /// request was refused and the bucket was left untouched.
    fn take_max_duration(&self, count: i64, max_wait: Duration) -> Duration;

    /// Long-run admission rate in tokens per second
    fn rate(&self) -> f64;

    /// Take `count` tokens and sleep the calling thread until they are due
    fn wait(&self, count: i64) {
        let wait = self.take(count);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    /// Take `count` tokens if they are due within `max_wait`, sleeping until
    /// then. Returns `false` without sleeping when the deadline cannot be met.
    fn wait_max_duration(&self, count: i64, max_wait: Duration) -> bool {
        let wait = self.take_max_duration(count, max_wait);
        if wait > max_wait {
            return false;
        }
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        true
    }

    /// Asynchronous [`wait`](Self::wait) using the tokio timer
    fn wait_async(&self, count: i64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let wait = self.take(count);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        })
    }

    /// Asynchronous [`wait_max_duration`](Self::wait_max_duration)
    fn wait_max_duration_async(&self, count: i64, max_wait: Duration) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let wait = self.take_max_duration(count, max_wait);
            if wait > max_wait {
                return false;
            }
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            true
        })
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    fn take(&self, count: i64) -> Duration {
        (**self).take(count)
    }

    fn take_available(&self, count: i64) -> i64 {
        (**self).take_available(count)
    }

    fn available(&self) -> i64 {
        (**self).available()
    }

    fn take_max_duration(&self, count: i64, max_wait: Duration) -> Duration {
        (**self).take_max_duration(count, max_wait)
    }

    fn rate(&self) -> f64 {
        (**self).rate()
    }

    fn wait(&self, count: i64) {
        (**self).wait(count)
    }

    fn wait_max_duration(&self, count: i64, max_wait: Duration) -> bool {
        (**self).wait_max_duration(count, max_wait)
    }

    fn wait_async(&self, count: i64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        (**self).wait_async(count)
    }

    fn wait_max_duration_async(&self, count: i64, max_wait: Duration) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        (**self).wait_max_duration_async(count, max_wait)
    }
}
