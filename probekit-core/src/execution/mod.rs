//! Probe execution against the external backend
//!
//! The backend itself sits behind the [`Executor`] trait. [`ProbeRunner`]
//! wraps it with bounded concurrency, rate limiting, per-attempt timeouts and
//! retries; [`collect_execution`] folds a streamed event channel into an
//! [`ExecutionResult`] for executors that produce output incrementally.

pub mod runner;
pub mod stream;

pub use runner::ProbeRunner;
pub use stream::{ExecutionEvent, collect_execution};

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::concurrency::Transient;
use crate::model::{ErrorCategory, ExecutionResult, Probe, ProbeFailure};

/// Error from one execution attempt
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{category}: {message}")]
pub struct ExecutionError {
    pub category: ErrorCategory,
    /// Status code reported by the backend, if any
    pub status: Option<u16>,
    pub message: String,
}

impl ExecutionError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            status: None,
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ApiError, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorCategory::Timeout,
            format!("Execution timed out after {after:?}"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCategory::Timeout, "Execution cancelled")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn to_failure(&self) -> ProbeFailure {
        ProbeFailure {
            category: self.category,
            message: self.message.clone(),
        }
    }
}

impl Transient for ExecutionError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn is_cancellation(&self) -> bool {
        self.category == ErrorCategory::Timeout
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::BudgetExceeded | ErrorCategory::PermissionDenied
        )
    }
}

/// External execution backend
#[async_trait]
pub trait Executor: Send + Sync {
    /// Check the backend is reachable before any probe runs
    async fn preflight(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// Run one probe. Implementations should stop work once `cancel` fires;
    /// the runner abandons the call at its timeout either way.
    async fn execute(
        &self,
        probe: &Probe,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError>;
}
