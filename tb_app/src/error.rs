use tb_ratelimit::RateLimitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Rate limiter error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Invalid workload: {0}")]
    InvalidWorkload(&'static str),

    #[error("Worker thread {0} panicked")]
    WorkerPanicked(usize),
}

pub type Result<T> = std::result::Result<T, AppError>;
