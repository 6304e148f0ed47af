//! Integration tests driving a bucket through the `RateLimiter` trait

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tb_ratelimit::ManualClock;
use tb_ratelimit::RateLimiter;
use tb_ratelimit::TokenBucket;

fn shared(limiter: impl RateLimiter + 'static) -> Arc<dyn RateLimiter> {
    Arc::new(limiter)
}

#[test]
fn test_concurrent_waits_grant_every_request() {
    const THREADS: usize = 8;
    const PER_THREAD: i64 = 10_000;

    const CAPACITY: i64 = 1 << 62;

    // No tick elapses during the test, so the balance only moves by what is taken
    let bucket = Arc::new(TokenBucket::new(Duration::from_secs(3600), 1, CAPACITY).unwrap());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let bucket = Arc::clone(&bucket);
            std::thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    bucket.wait(1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bucket.available(), CAPACITY - THREADS as i64 * PER_THREAD);
}

#[test]
fn test_concurrent_wait_max_duration_splits_exactly() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 200;
    const CAPACITY: i64 = 500;

    // Frozen clock and a zero deadline: only the stored tokens can be granted
    let clock = ManualClock::new();
    let limiter = shared(TokenBucket::with_clock(Duration::from_secs(1), 1, CAPACITY, clock).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            std::thread::spawn(move || (0..PER_THREAD).filter(|_| limiter.wait_max_duration(1, Duration::ZERO)).count())
        })
        .collect();

    let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(granted as i64, CAPACITY);
    assert_eq!(limiter.available(), 0);
}

#[test]
fn test_trait_object_surface() {
    let clock = ManualClock::new();
    let limiter = shared(TokenBucket::with_clock(Duration::from_millis(10), 1, 5, clock.clone()).unwrap());

    assert_eq!(limiter.rate(), 100.0);
    assert_eq!(limiter.take(10), Duration::from_millis(50));

    clock.set_elapsed(Duration::from_millis(60));
    assert_eq!(limiter.take(5), Duration::from_millis(40));
    assert_eq!(limiter.take_max_duration(1, Duration::from_millis(49)), Duration::from_millis(50));
    assert_eq!(limiter.take(1), Duration::from_millis(50));
    assert_eq!(limiter.take_available(1), 0);
}

#[test]
fn test_wait_sleeps_for_reserved_tokens() {
    let started = Instant::now();
    let limiter = shared(TokenBucket::new(Duration::from_millis(20), 1, 1).unwrap());

    limiter.wait(1);
    limiter.wait(2);
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn test_async_wait() {
    let bucket = TokenBucket::with_rate(100.0, 10).unwrap();

    // Exhaust tokens
    assert_eq!(bucket.take_available(10), 10);

    // Needs ~10ms to earn one token
    let result = tokio::time::timeout(Duration::from_millis(500), bucket.wait_async(1)).await;
    assert!(result.is_ok(), "Async wait timed out");
}

#[tokio::test]
async fn test_async_wait_max_duration() {
    let clock = ManualClock::new();
    let bucket = TokenBucket::with_clock(Duration::from_secs(60), 1, 2, clock).unwrap();

    assert!(bucket.wait_max_duration_async(2, Duration::ZERO).await);
    assert!(!bucket.wait_max_duration_async(1, Duration::from_secs(1)).await);
    assert_eq!(bucket.available(), 0);
}
