//! # tb_app
//!
//! Config loading, tracing setup and a threaded workload driver for
//! exercising `tb_ratelimit` buckets

pub mod cli;
pub mod config_loader;
pub mod driver;
pub mod error;
pub mod tracing_setup;

pub use error::AppError;
