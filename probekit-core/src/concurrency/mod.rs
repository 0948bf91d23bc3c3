//! Scheduling building blocks: bounded parallelism, retry with backoff, and
//! dispatch-rate limiting.

pub mod parallel;
pub mod rate_limit;
pub mod retry;

pub use parallel::{BatchOutcome, ParallelOptions, run_parallel};
pub use rate_limit::RateLimiter;
pub use retry::{RetryConfig, RetryState, Transient, is_transient, with_retry, with_retry_notify};
