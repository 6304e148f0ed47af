use thiserror::Error;

/// Result type for rate limiter construction
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Errors that can occur while building a rate limiter
///
/// Admission never fails with an error: a request that cannot be served
/// within its deadline is reported through the returned wait duration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    /// Invalid configuration
    #[error("Invalid rate limiter configuration: {0}")]
    InvalidArgument(&'static str),

    /// The rate search did not find an integer quantum within the margin
    #[error("No suitable quantum for rate {rate} tokens/s")]
    NoSuitableQuantum { rate: f64 },
}
