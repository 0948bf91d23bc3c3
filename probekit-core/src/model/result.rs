//! Per-probe evaluation output

use serde::{Deserialize, Serialize};

use super::{ComponentRef, DetectionSource, ExecutionErrorRecord, ProbeFailure};
use crate::judge::ConsensusResult;

/// How far a conflicting trigger strays from the expected component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    #[default]
    None,
    /// Unexpected component shares a domain token with the expected one
    Minor,
    /// Unexpected component is unrelated
    Major,
}

/// Expected vs. actually triggered components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    pub expected: ComponentRef,
    pub triggered: Vec<ComponentRef>,
    pub has_conflict: bool,
    pub severity: ConflictSeverity,
}

impl ConflictAnalysis {
    /// No detections at all
    pub fn none(expected: ComponentRef) -> Self {
        Self {
            expected,
            triggered: Vec::new(),
            has_conflict: false,
            severity: ConflictSeverity::None,
        }
    }

    /// Triggered components other than the expected one
    pub fn conflicting(&self) -> impl Iterator<Item = &ComponentRef> {
        self.triggered.iter().filter(move |c| **c != self.expected)
    }
}

/// Agreement of repeated runs of the same probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionSummary {
    pub runs: u32,
    pub triggered_count: u32,
    pub flaky: bool,
}

/// Final record for one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub probe_id: String,
    pub component: ComponentRef,
    pub expect_trigger: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,

    pub triggered: bool,
    /// 0-100
    pub confidence: u8,
    pub quality_score: Option<f64>,
    pub evidence: Vec<String>,
    pub detection_source: Option<DetectionSource>,
    pub all_triggered_components: Vec<ComponentRef>,
    pub conflict: ConflictAnalysis,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition: Option<RepetitionSummary>,

    /// Set when the probe could not be executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
    #[serde(default)]
    pub execution_errors: Vec<ExecutionErrorRecord>,
    /// Tools the backend refused, across all runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_denials: Vec<String>,

    pub cost_usd: f64,
    pub duration_ms: u64,
}

impl EvaluationResult {
    /// Observed trigger matched the expectation
    pub fn is_correct(&self) -> bool {
        self.triggered == self.expect_trigger
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some() || !self.execution_errors.is_empty()
    }
}
