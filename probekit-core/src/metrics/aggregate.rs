//! Run-level metrics derived from evaluation results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PricingTable;
use crate::config::EvalConfig;
use crate::model::{ConflictSeverity, ErrorCategory, EvaluationResult};

/// Score variance above which a probe is reported as high-variance
pub const HIGH_VARIANCE_THRESHOLD: f64 = 1.0;

/// Which optional stats blocks to compute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsOptions {
    pub multi_sample: bool,
    pub scenario_breakdown: bool,
    pub repetitions: bool,
}

impl MetricsOptions {
    /// Options matching what a run with this config and result set enabled
    pub fn for_run(config: &EvalConfig, results: &[EvaluationResult]) -> Self {
        Self {
            multi_sample: config.judge.is_multi_sample(),
            scenario_breakdown: results.iter().any(|r| r.scenario_type.is_some()),
            repetitions: config.execution.repetitions > 1,
        }
    }
}

/// Conflict counts by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCounts {
    pub total: usize,
    pub minor: usize,
    pub major: usize,
}

/// Agreement across judge samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSampleStats {
    pub judged_probes: usize,
    pub avg_variance: f64,
    /// Probe ids whose score variance exceeds [`HIGH_VARIANCE_THRESHOLD`]
    pub high_variance_probes: Vec<String>,
    /// Fraction of judged probes with unanimous labels
    pub consensus_rate: f64,
}

/// Trigger behaviour for one scenario type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationStats {
    pub total: usize,
    pub triggered: usize,
    pub trigger_rate: f64,
    pub accuracy: f64,
}

/// Flakiness across repeated runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionStats {
    pub repeated_probes: usize,
    pub flaky_count: usize,
    pub flaky_probes: Vec<String>,
    /// `1 - flaky / total`
    pub consistency_rate: f64,
}

/// Aggregate metrics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub total_probes: usize,
    pub triggered_count: usize,
    pub correct_count: usize,
    pub failed_count: usize,
    pub trigger_rate: f64,
    pub accuracy: f64,

    /// Mean of non-null, non-zero quality scores
    pub avg_quality_score: Option<f64>,
    pub scored_count: usize,

    pub conflicts: ConflictCounts,

    pub total_cost_usd: f64,
    pub avg_cost_usd: f64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub judge_cost_usd: f64,

    pub error_counts: BTreeMap<ErrorCategory, usize>,
    /// Probes where the backend refused at least one tool
    #[serde(default)]
    pub permission_denied_probes: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_sample: Option<MultiSampleStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_scenario: Option<BTreeMap<String, VariationStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition: Option<RepetitionStats>,
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Compute run metrics. Pure: the same results always give the same metrics.
pub fn compute_metrics(
    results: &[EvaluationResult],
    options: MetricsOptions,
    pricing: &PricingTable,
) -> EvalMetrics {
    let total = results.len();
    let triggered_count = results.iter().filter(|r| r.triggered).count();
    let correct_count = results.iter().filter(|r| r.is_correct()).count();
    let failed_count = results.iter().filter(|r| r.is_failed()).count();

    let scores: Vec<f64> = results
        .iter()
        .filter_map(|r| r.quality_score)
        .filter(|score| *score != 0.0)
        .collect();
    let avg_quality_score =
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

    let mut conflicts = ConflictCounts::default();
    for result in results.iter().filter(|r| r.conflict.has_conflict) {
        conflicts.total += 1;
        match result.conflict.severity {
            ConflictSeverity::Minor => conflicts.minor += 1,
            ConflictSeverity::Major => conflicts.major += 1,
            ConflictSeverity::None => {}
        }
    }

    let mut error_counts = BTreeMap::new();
    for result in results {
        if let Some(failure) = &result.failure {
            *error_counts.entry(failure.category).or_insert(0) += 1;
        }
        for error in &result.execution_errors {
            *error_counts.entry(error.category).or_insert(0) += 1;
        }
    }

    let total_cost_usd: f64 = results.iter().map(|r| r.cost_usd).sum();
    let total_duration_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
    let judge_cost_usd = results
        .iter()
        .filter_map(|r| r.consensus.as_ref())
        .flat_map(|c| c.judgments.iter())
        .filter_map(|j| j.usage.as_ref())
        .map(|usage| pricing.calculate_cost(usage))
        .sum();

    EvalMetrics {
        total_probes: total,
        triggered_count,
        correct_count,
        failed_count,
        trigger_rate: ratio(triggered_count, total),
        accuracy: ratio(correct_count, total),
        avg_quality_score,
        scored_count: scores.len(),
        conflicts,
        total_cost_usd,
        avg_cost_usd: if total == 0 { 0.0 } else { total_cost_usd / total as f64 },
        total_duration_ms,
        avg_duration_ms: if total == 0 {
            0.0
        } else {
            total_duration_ms as f64 / total as f64
        },
        judge_cost_usd,
        error_counts,
        permission_denied_probes: results
            .iter()
            .filter(|r| !r.permission_denials.is_empty())
            .count(),
        multi_sample: options.multi_sample.then(|| multi_sample_stats(results)),
        by_scenario: options.scenario_breakdown.then(|| scenario_stats(results)),
        repetition: options.repetitions.then(|| repetition_stats(results)),
    }
}

fn multi_sample_stats(results: &[EvaluationResult]) -> MultiSampleStats {
    let judged: Vec<_> = results
        .iter()
        .filter_map(|r| r.consensus.as_ref().map(|c| (r.probe_id.as_str(), c)))
        .collect();

    let avg_variance = if judged.is_empty() {
        0.0
    } else {
        judged.iter().map(|(_, c)| c.score_variance).sum::<f64>() / judged.len() as f64
    };

    MultiSampleStats {
        judged_probes: judged.len(),
        avg_variance,
        high_variance_probes: judged
            .iter()
            .filter(|(_, c)| c.score_variance > HIGH_VARIANCE_THRESHOLD)
            .map(|(id, _)| id.to_string())
            .collect(),
        consensus_rate: ratio(judged.iter().filter(|(_, c)| c.is_unanimous).count(), judged.len()),
    }
}

fn scenario_stats(results: &[EvaluationResult]) -> BTreeMap<String, VariationStats> {
    let mut groups: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();
    for result in results {
        let key = result.scenario_type.clone().unwrap_or_else(|| "unspecified".to_string());
        let entry = groups.entry(key).or_default();
        entry.0 += 1;
        entry.1 += usize::from(result.triggered);
        entry.2 += usize::from(result.is_correct());
    }

    groups
        .into_iter()
        .map(|(scenario, (total, triggered, correct))| {
            (
                scenario,
                VariationStats {
                    total,
                    triggered,
                    trigger_rate: ratio(triggered, total),
                    accuracy: ratio(correct, total),
                },
            )
        })
        .collect()
}

fn repetition_stats(results: &[EvaluationResult]) -> RepetitionStats {
    let repeated: Vec<_> = results
        .iter()
        .filter_map(|r| r.repetition.as_ref().map(|rep| (r.probe_id.as_str(), rep)))
        .collect();
    let flaky_probes: Vec<String> = repeated
        .iter()
        .filter(|(_, rep)| rep.flaky)
        .map(|(id, _)| id.to_string())
        .collect();

    RepetitionStats {
        repeated_probes: repeated.len(),
        flaky_count: flaky_probes.len(),
        consistency_rate: if repeated.is_empty() {
            1.0
        } else {
            1.0 - ratio(flaky_probes.len(), repeated.len())
        },
        flaky_probes,
    }
}
