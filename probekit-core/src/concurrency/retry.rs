//! Retry logic for calls to metered external services
//!
//! Implements exponential backoff with jitter for transient failures. Only
//! errors classified as transient are retried; cancellations never are.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (before jitter)
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 adds up to 10%)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Builder: set max attempts
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builder: set max delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Builder: set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Builder: set jitter fraction
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// `min(initial * multiplier^attempt, max)` for a 0-indexed retry
    pub fn base_delay_for_attempt(&self, attempt: usize) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let clamped_delay = base_delay.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(clamped_delay as u64)
    }

    /// Base delay scaled by `1 + jitter * random`, with `random` in [0, 1)
    pub fn delay_with_random(&self, attempt: usize, random: f64) -> Duration {
        let base = self.base_delay_for_attempt(attempt).as_millis() as f64;
        let factor = 1.0 + self.jitter * random.clamp(0.0, 1.0);
        Duration::from_millis((base * factor) as u64)
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if self.jitter > 0.0 {
            self.delay_with_random(attempt, rand::random::<f64>())
        } else {
            self.base_delay_for_attempt(attempt)
        }
    }
}

/// Classification hooks for errors passing through [`with_retry`]
///
/// The error message comes from `Display`; implementors add a status code
/// when the failure carried one, and flag cancellations or terminal
/// categories so they are never retried.
pub trait Transient: std::fmt::Display {
    /// Numeric status code (HTTP-style) if known
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Whether the error is the result of a cancellation or timeout token firing
    fn is_cancellation(&self) -> bool {
        false
    }

    /// Whether the failure can never succeed on retry, whatever its message says
    fn is_terminal(&self) -> bool {
        false
    }
}

impl Transient for str {}
impl Transient for String {}
impl Transient for &str {}

/// A 429/5xx code only counts when it is labelled as a status
static TRANSIENT_STATUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:status|http|code)\W*(?:429|5\d\d)\b").unwrap()
});

const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "overloaded",
    "server error",
    "service unavailable",
    "bad gateway",
    "econnreset",
    "connection reset",
    "socket hang up",
    "etimedout",
    "network error",
    "network timeout",
];

/// Message-only half of the classification
pub fn message_is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
        || TRANSIENT_STATUS_RE.is_match(&lower)
}

/// Whether an error should be retried
///
/// Cancellations and terminal errors never are. 429 and 5xx status codes
/// always are. Otherwise the message is inspected for rate-limit, overload
/// and network-reset markers.
pub fn is_transient<E: Transient + ?Sized>(error: &E) -> bool {
    if error.is_cancellation() || error.is_terminal() {
        return false;
    }
    if let Some(status) = error.status_code() {
        if status == 429 || (500..600).contains(&status) {
            return true;
        }
    }
    message_is_transient(&error.to_string())
}

/// Retry state tracker
#[derive(Debug)]
pub struct RetryState {
    config: RetryConfig,
    attempt: usize,
    last_error: Option<String>,
}

impl RetryState {
    /// Create a new retry state
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt: 0,
            last_error: None,
        }
    }

    /// Check if another attempt fits in the budget
    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_attempts
    }

    /// Record a failed attempt
    pub fn record_attempt(&mut self, error: impl Into<String>) {
        self.attempt += 1;
        self.last_error = Some(error.into());
    }

    /// Delay before the next retry
    pub fn next_delay(&self) -> Duration {
        self.config
            .delay_for_attempt(self.attempt.saturating_sub(1))
    }

    /// Failed attempts so far
    pub fn current_attempt(&self) -> usize {
        self.attempt
    }

    /// Get remaining attempts
    pub fn remaining_attempts(&self) -> usize {
        self.config.max_attempts.saturating_sub(self.attempt)
    }

    /// Get the last error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Execute an async operation with retries
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient,
{
    with_retry_notify(config, operation, |_: &E, _, _| {}).await
}

/// Execute an async operation with retries, calling `on_retry(error, attempt, delay)`
/// before each backoff sleep. `attempt` is the 1-based number of the attempt
/// that just failed.
pub async fn with_retry_notify<F, Fut, T, E, N>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient,
    N: FnMut(&E, usize, Duration),
{
    let mut state = RetryState::new(config.clone());

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                state.record_attempt(e.to_string());

                if !is_transient(&e) || !state.should_retry() {
                    return Err(e);
                }

                let delay = state.next_delay();
                tracing::debug!(
                    attempt = state.current_attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                on_retry(&e, state.current_attempt(), delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
