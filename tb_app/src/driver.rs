use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use tb_ratelimit::RateLimiter;
use tracing::debug;
use tracing::info;

use crate::error::AppError;
use crate::error::Result;

/// Synthetic workload pushed through a limiter by [`run`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Workload {
    pub workers: usize,
    pub requests_per_worker: u64,
    pub tokens_per_request: i64,
    /// Refuse requests that would wait longer than this, wait forever if unset
    pub max_wait_ms: Option<u64>,
}

impl Workload {
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::InvalidWorkload("workers must be greater than 0"));
        }
        if self.tokens_per_request <= 0 {
            return Err(AppError::InvalidWorkload("tokens_per_request must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self { workers: 4, requests_per_worker: 50, tokens_per_request: 1, max_wait_ms: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub granted: u64,
    pub refused: u64,
    pub tokens: i64,
    pub elapsed: Duration,
}

impl RunReport {
    /// Granted tokens per second of wall-clock time
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 { 0.0 } else { self.tokens as f64 / secs }
    }
}

/// Run `workload` against `limiter` on scoped worker threads
///
/// Each worker admits its requests one at a time with
/// [`wait`](RateLimiter::wait), or with
/// [`wait_max_duration`](RateLimiter::wait_max_duration) when the workload
/// sets a deadline. Refused requests are counted and skipped.
pub fn run<L: RateLimiter + ?Sized>(limiter: &L, workload: &Workload) -> Result<RunReport> {
    workload.validate()?;

    let granted = AtomicU64::new(0);
    let refused = AtomicU64::new(0);
    let tokens = AtomicI64::new(0);
    let max_wait = workload.max_wait();
    let started = Instant::now();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workload.workers)
            .map(|worker| {
                let (granted, refused, tokens) = (&granted, &refused, &tokens);
                scope.spawn(move || {
                    for _ in 0..workload.requests_per_worker {
                        let admitted = match max_wait {
                            Some(max_wait) => limiter.wait_max_duration(workload.tokens_per_request, max_wait),
                            None => {
                                limiter.wait(workload.tokens_per_request);
                                true
                            }
                        };

                        if admitted {
                            granted.fetch_add(1, Ordering::Relaxed);
                            tokens.fetch_add(workload.tokens_per_request, Ordering::Relaxed);
                        } else {
                            refused.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    debug!("Worker {worker} finished");
                })
            })
            .collect();

        // Every handle is joined, the scope re-panics on any left unjoined
        let mut panicked = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(worker);
            }
        }
        panicked.map_or(Ok(()), |worker| Err(AppError::WorkerPanicked(worker)))
    })?;

    let report = RunReport {
        granted: granted.into_inner(),
        refused: refused.into_inner(),
        tokens: tokens.into_inner(),
        elapsed: started.elapsed(),
    };
    info!("Run finished: granted={}, refused={}, tokens={}, elapsed={:?}", report.granted, report.refused, report.tokens, report.elapsed);

    Ok(report)
}
