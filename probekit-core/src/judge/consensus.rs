//! Multi-sample judgment aggregation

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Judge, Judgment, TriggerAccuracy};
use crate::config::JudgeConfig;
use crate::model::{Probe, Signal, TranscriptEvent};

/// How individual quality scores are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMethod {
    /// Arithmetic mean
    #[default]
    Average,
    /// Middle value (mean of the two middles for even counts)
    Median,
    /// Mean of the scores whose label agrees with the majority label
    Consensus,
}

/// Aggregated verdict over k judgments of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub method: AggregateMethod,
    pub individual_scores: Vec<f64>,
    pub aggregated_score: f64,
    /// Population variance of `individual_scores`
    pub score_variance: f64,
    pub consensus_trigger_accuracy: TriggerAccuracy,
    pub is_unanimous: bool,
    /// Union of every sample's issues, first-seen order
    pub all_issues: Vec<String>,
    /// First judgment carrying the consensus label
    pub representative: Judgment,
    /// Every sample, for cost accounting
    #[serde(default)]
    pub judgments: Vec<Judgment>,
    /// Set when the judge failed and the synthesized zero-score judgment stands in
    #[serde(default)]
    pub degraded: bool,
}

impl ConsensusResult {
    pub fn sample_count(&self) -> usize {
        self.individual_scores.len()
    }

    /// True when the evaluator fell back to the synthesized failure judgment
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Majority label; ties go to whichever label was seen first
fn majority_label(judgments: &[Judgment]) -> Option<TriggerAccuracy> {
    let mut votes: Vec<(TriggerAccuracy, usize)> = Vec::new();
    for judgment in judgments {
        match votes.iter_mut().find(|(label, _)| *label == judgment.trigger_accuracy) {
            Some((_, count)) => *count += 1,
            None => votes.push((judgment.trigger_accuracy, 1)),
        }
    }

    let mut best: Option<(TriggerAccuracy, usize)> = None;
    for (label, count) in votes {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Fold judgments into a [`ConsensusResult`]
///
/// An empty set is treated like a judge failure.
pub fn aggregate_judgments(judgments: Vec<Judgment>, method: AggregateMethod) -> ConsensusResult {
    let degraded = judgments.is_empty();
    let judgments = if degraded {
        vec![Judgment::failed("no judgments produced")]
    } else {
        judgments
    };

    let scores: Vec<f64> = judgments.iter().map(|j| j.quality_score).collect();
    let label = majority_label(&judgments).unwrap_or(TriggerAccuracy::Incorrect);
    let is_unanimous = judgments.iter().all(|j| j.trigger_accuracy == label);

    let aggregated_score = match method {
        AggregateMethod::Average => mean(&scores),
        AggregateMethod::Median => median(&scores),
        AggregateMethod::Consensus => {
            let agreeing: Vec<f64> = judgments
                .iter()
                .filter(|j| j.trigger_accuracy == label)
                .map(|j| j.quality_score)
                .collect();
            mean(&agreeing)
        }
    };

    let mut all_issues: Vec<String> = Vec::new();
    for issue in judgments.iter().flat_map(|j| j.issues.iter()) {
        if !all_issues.contains(issue) {
            all_issues.push(issue.clone());
        }
    }

    let representative = judgments
        .iter()
        .find(|j| j.trigger_accuracy == label)
        .unwrap_or(&judgments[0])
        .clone();

    ConsensusResult {
        method,
        score_variance: population_variance(&scores),
        individual_scores: scores,
        aggregated_score,
        consensus_trigger_accuracy: label,
        is_unanimous,
        all_issues,
        representative,
        judgments,
        degraded,
    }
}

/// Draws `num_samples` independent judgments per probe and aggregates them
#[derive(Clone)]
pub struct ConsensusEvaluator {
    judge: Arc<dyn Judge>,
    config: JudgeConfig,
}

impl std::fmt::Debug for ConsensusEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEvaluator")
            .field("num_samples", &self.config.num_samples)
            .field("method", &self.config.aggregate_method)
            .finish()
    }
}

impl ConsensusEvaluator {
    pub fn new(judge: Arc<dyn Judge>, config: JudgeConfig) -> Self {
        Self { judge, config }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Judge one probe run
    ///
    /// Samples are requested concurrently. If any of them fails the whole
    /// probe degrades to a single zero-score judgment; nothing is retried here.
    pub async fn evaluate(
        &self,
        probe: &Probe,
        transcript: &[TranscriptEvent],
        detections: &[Signal],
    ) -> ConsensusResult {
        let samples = self.config.num_samples.clamp(1, 5);
        let requests =
            (0..samples).map(|_| self.judge.judge(probe, transcript, detections, &self.config));

        match try_join_all(requests).await {
            Ok(judgments) => {
                let result = aggregate_judgments(judgments, self.config.aggregate_method);
                tracing::debug!(
                    probe_id = %probe.id,
                    samples,
                    score = result.aggregated_score,
                    variance = result.score_variance,
                    unanimous = result.is_unanimous,
                    "Consensus computed"
                );
                result
            }
            Err(e) => {
                tracing::warn!(
                    probe_id = %probe.id,
                    error = %e,
                    "Judge failed, degrading to zero score"
                );
                let mut result = aggregate_judgments(
                    vec![Judgment::failed(e.to_string())],
                    self.config.aggregate_method,
                );
                result.degraded = true;
                result
            }
        }
    }
}
