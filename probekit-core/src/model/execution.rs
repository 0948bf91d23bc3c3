//! Execution results returned by the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::TranscriptEvent;

/// Error taxonomy used for per-probe failures and metrics bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ApiError,
    Timeout,
    PermissionDenied,
    BudgetExceeded,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ApiError => "api_error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::BudgetExceeded => "budget_exceeded",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool invocation observed in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCapture {
    pub name: String,
    #[serde(default)]
    pub input: Value,
    pub tool_use_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolCapture {
    pub fn new(name: impl Into<String>, input: Value, tool_use_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input,
            tool_use_id: tool_use_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Error reported by the backend while a probe ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionErrorRecord {
    pub category: ErrorCategory,
    pub message: String,
}

/// Everything the backend observed for one probe run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub probe_id: String,
    #[serde(default)]
    pub transcript: Vec<TranscriptEvent>,
    #[serde(default)]
    pub captures: Vec<ToolCapture>,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub permission_denials: Vec<String>,
    #[serde(default)]
    pub errors: Vec<ExecutionErrorRecord>,
}

impl ExecutionResult {
    pub fn new(probe_id: impl Into<String>) -> Self {
        Self {
            probe_id: probe_id.into(),
            ..Default::default()
        }
    }

    pub fn with_transcript(mut self, transcript: Vec<TranscriptEvent>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_capture(mut self, capture: ToolCapture) -> Self {
        self.captures.push(capture);
        self
    }

    pub fn with_cost(mut self, cost_usd: f64, duration_ms: u64) -> Self {
        self.cost_usd = cost_usd;
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_permission_denial(mut self, tool: impl Into<String>) -> Self {
        self.permission_denials.push(tool.into());
        self
    }

    pub fn with_error(mut self, category: ErrorCategory, message: impl Into<String>) -> Self {
        self.errors.push(ExecutionErrorRecord {
            category,
            message: message.into(),
        });
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Terminal failure of a probe run (after retries)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub category: ErrorCategory,
    pub message: String,
}

/// Outcome of one probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed(ExecutionResult),
    Failed(ProbeFailure),
}

/// Persisted record of one probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub probe_id: String,
    /// 0-based repetition index
    #[serde(default)]
    pub repetition: u32,
    pub outcome: ExecutionOutcome,
}

impl ExecutionRecord {
    pub fn completed(result: ExecutionResult, repetition: u32) -> Self {
        Self {
            probe_id: result.probe_id.clone(),
            repetition,
            outcome: ExecutionOutcome::Completed(result),
        }
    }

    pub fn failed(probe_id: impl Into<String>, repetition: u32, failure: ProbeFailure) -> Self {
        Self {
            probe_id: probe_id.into(),
            repetition,
            outcome: ExecutionOutcome::Failed(failure),
        }
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        match &self.outcome {
            ExecutionOutcome::Completed(result) => Some(result),
            ExecutionOutcome::Failed(_) => None,
        }
    }

    /// Failed call, or a completed run that reported execution-time errors
    pub fn is_failed(&self) -> bool {
        match &self.outcome {
            ExecutionOutcome::Completed(result) => result.has_errors(),
            ExecutionOutcome::Failed(_) => true,
        }
    }
}
