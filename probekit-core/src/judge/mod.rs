//! Quality judging
//!
//! The [`Judge`] trait is the seam to the external assessor (usually an LLM
//! call). [`ConsensusEvaluator`] draws several independent judgments for a
//! probe and folds them into a single verdict with variance and unanimity.

mod consensus;

pub use consensus::{AggregateMethod, ConsensusEvaluator, ConsensusResult, aggregate_judgments};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::concurrency::Transient;
use crate::config::JudgeConfig;
use crate::model::{Probe, Signal, TranscriptEvent};

/// Categorical assessment of whether the trigger behaviour was right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAccuracy {
    Correct,
    Incorrect,
    Partial,
}

impl fmt::Display for TriggerAccuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerAccuracy::Correct => "correct",
            TriggerAccuracy::Incorrect => "incorrect",
            TriggerAccuracy::Partial => "partial",
        };
        f.write_str(s)
    }
}

/// Token usage reported by a judge call, priced by [`crate::metrics::PricingTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// `provider:model`
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One independent quality assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// 0-10
    pub quality_score: f64,
    pub trigger_accuracy: TriggerAccuracy,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Judgment {
    pub fn new(quality_score: f64, trigger_accuracy: TriggerAccuracy) -> Self {
        Self {
            quality_score,
            trigger_accuracy,
            issues: Vec::new(),
            summary: String::new(),
            usage: None,
        }
    }

    pub fn with_issues(mut self, issues: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.issues = issues.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Degraded stand-in used when the judge itself failed
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            quality_score: 0.0,
            trigger_accuracy: TriggerAccuracy::Incorrect,
            summary: format!("Judge failed: {message}"),
            issues: vec![message],
            usage: None,
        }
    }
}

/// Errors surfaced by a judge implementation
#[derive(Debug, Clone, thiserror::Error)]
pub enum JudgeError {
    /// The judge request failed
    #[error("Judge request failed: {message}")]
    Request {
        message: String,
        status: Option<u16>,
    },

    /// The judge answered with something unparseable
    #[error("Invalid judge response: {0}")]
    InvalidResponse(String),

    /// The call was cancelled before an answer arrived
    #[error("Judge call cancelled")]
    Cancelled,
}

impl Transient for JudgeError {
    fn status_code(&self) -> Option<u16> {
        match self {
            JudgeError::Request { status, .. } => *status,
            _ => None,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, JudgeError::Cancelled)
    }
}

/// External quality assessor
#[async_trait]
pub trait Judge: Send + Sync {
    /// Assess one probe run. Retrying, if wanted, belongs inside the
    /// implementation; failures here degrade the probe's consensus instead.
    async fn judge(
        &self,
        probe: &Probe,
        transcript: &[TranscriptEvent],
        detections: &[Signal],
        config: &JudgeConfig,
    ) -> Result<Judgment, JudgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::is_transient;

    #[test]
    fn test_failed_judgment_shape() {
        let judgment = Judgment::failed("connection refused");
        assert_eq!(judgment.quality_score, 0.0);
        assert_eq!(judgment.issues, vec!["connection refused".to_string()]);
        assert_eq!(judgment.trigger_accuracy, TriggerAccuracy::Incorrect);
    }

    #[test]
    fn test_judge_error_classification() {
        let overloaded = JudgeError::Request {
            message: "overloaded".to_string(),
            status: Some(529),
        };
        assert!(is_transient(&overloaded));
        assert!(!is_transient(&JudgeError::InvalidResponse("not json".into())));
        assert!(!is_transient(&JudgeError::Cancelled));
    }
}
