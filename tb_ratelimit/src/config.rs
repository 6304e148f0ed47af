use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::time::Clock;
use crate::time::MonotonicClock;
use crate::token_bucket::TokenBucket;

/// Declarative bucket parameters, as read from a config file
///
/// ```toml
/// kind = "interval"
/// fill_interval_us = 250000
/// quantum = 1
/// capacity = 10
/// ```
///
/// ```toml
/// kind = "rate"
/// rate = 100.0
/// capacity = 20
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketConfig {
    Interval { fill_interval_us: u64, quantum: i64, capacity: i64 },
    Rate { rate: f64, capacity: i64 },
}

impl BucketConfig {
    pub fn capacity(&self) -> i64 {
        match self {
            BucketConfig::Interval { capacity, .. } | BucketConfig::Rate { capacity, .. } => *capacity,
        }
    }

    pub fn build(&self) -> Result<TokenBucket> {
        self.build_with_clock(MonotonicClock)
    }

    pub fn build_with_clock<C: Clock>(&self, clock: C) -> Result<TokenBucket<C>> {
        match *self {
            BucketConfig::Interval { fill_interval_us, quantum, capacity } => {
                TokenBucket::with_clock(Duration::from_micros(fill_interval_us), quantum, capacity, clock)
            }
            BucketConfig::Rate { rate, capacity } => TokenBucket::with_rate_and_clock(rate, capacity, clock),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig::Rate { rate: 100.0, capacity: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateLimitError;
    use crate::limiter::RateLimiter;

    #[test]
    fn test_interval_from_toml() {
        let config: BucketConfig = toml::from_str("kind = \"interval\"\nfill_interval_us = 250000\nquantum = 2\ncapacity = 10\n").unwrap();
        assert_eq!(config, BucketConfig::Interval { fill_interval_us: 250_000, quantum: 2, capacity: 10 });

        let bucket = config.build().unwrap();
        assert_eq!(bucket.fill_interval(), Duration::from_millis(250));
        assert_eq!(bucket.rate(), 8.0);
        assert_eq!(bucket.available(), 10);
    }

    #[test]
    fn test_rate_from_toml() {
        let config: BucketConfig = toml::from_str("kind = \"rate\"\nrate = 50.0\ncapacity = 5\n").unwrap();
        assert_eq!(config.capacity(), 5);

        let bucket = config.build().unwrap();
        assert_eq!(bucket.rate(), 50.0);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(toml::from_str::<BucketConfig>("kind = \"leaky\"\ncapacity = 5\n").is_err());
    }

    #[test]
    fn test_invalid_values_fail_at_build() {
        let config = BucketConfig::Interval { fill_interval_us: 0, quantum: 1, capacity: 1 };
        assert!(matches!(config.build(), Err(RateLimitError::InvalidArgument(_))));

        let config = BucketConfig::Rate { rate: -3.0, capacity: 1 };
        assert!(matches!(config.build(), Err(RateLimitError::InvalidArgument(_))));
    }
}
