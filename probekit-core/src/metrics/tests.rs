//! Tests for metrics aggregation

use crate::judge::{AggregateMethod, Judgment, TokenUsage, TriggerAccuracy, aggregate_judgments};
use crate::metrics::{MetricsOptions, PricingTable, compute_metrics};
use crate::model::{
    ComponentRef, ConflictAnalysis, ConflictSeverity, ErrorCategory, EvaluationResult,
    ExecutionErrorRecord, ProbeFailure, RepetitionSummary,
};

fn result(id: &str, expect: bool, triggered: bool) -> EvaluationResult {
    let component = ComponentRef::skill("commit");
    EvaluationResult {
        probe_id: id.to_string(),
        component: component.clone(),
        expect_trigger: expect,
        scenario_type: None,
        triggered,
        confidence: 100,
        quality_score: None,
        evidence: Vec::new(),
        detection_source: None,
        all_triggered_components: Vec::new(),
        conflict: ConflictAnalysis::none(component),
        consensus: None,
        repetition: None,
        failure: None,
        execution_errors: Vec::new(),
        permission_denials: Vec::new(),
        cost_usd: 0.0,
        duration_ms: 0,
    }
}

fn with_conflict(mut r: EvaluationResult, severity: ConflictSeverity) -> EvaluationResult {
    r.conflict.has_conflict = true;
    r.conflict.severity = severity;
    r
}

#[test]
fn test_rates_and_accuracy() {
    let results = vec![
        result("a", true, true),
        result("b", true, false),
        result("c", false, false),
        result("d", false, true),
    ];
    let metrics = compute_metrics(&results, MetricsOptions::default(), &PricingTable::new());

    assert_eq!(metrics.total_probes, 4);
    assert_eq!(metrics.trigger_rate, 0.5);
    assert_eq!(metrics.accuracy, 0.5);
    assert_eq!(metrics.correct_count, 2);
    assert!(metrics.multi_sample.is_none());
    assert!(metrics.by_scenario.is_none());
    assert!(metrics.repetition.is_none());
}

#[test]
fn test_quality_average_skips_null_and_zero() {
    let mut scored = result("a", true, true);
    scored.quality_score = Some(8.0);
    let mut zero = result("b", true, true);
    zero.quality_score = Some(0.0);
    let mut other = result("c", true, true);
    other.quality_score = Some(6.0);
    let unscored = result("d", true, true);

    let metrics = compute_metrics(
        &[scored, zero, other, unscored],
        MetricsOptions::default(),
        &PricingTable::new(),
    );
    assert_eq!(metrics.avg_quality_score, Some(7.0));
    assert_eq!(metrics.scored_count, 2);
}

#[test]
fn test_empty_result_set() {
    let metrics = compute_metrics(&[], MetricsOptions::default(), &PricingTable::new());
    assert_eq!(metrics.total_probes, 0);
    assert_eq!(metrics.trigger_rate, 0.0);
    assert_eq!(metrics.avg_quality_score, None);
    assert_eq!(metrics.avg_cost_usd, 0.0);
}

#[test]
fn test_conflicts_costs_and_errors() {
    let mut a = with_conflict(result("a", true, false), ConflictSeverity::Major);
    a.cost_usd = 0.25;
    a.duration_ms = 1000;
    let mut b = with_conflict(result("b", true, true), ConflictSeverity::Minor);
    b.cost_usd = 0.75;
    b.duration_ms = 3000;
    b.execution_errors.push(ExecutionErrorRecord {
        category: ErrorCategory::PermissionDenied,
        message: "Write denied".to_string(),
    });
    a.permission_denials.push("Bash".to_string());
    let mut c = result("c", true, false);
    c.confidence = 0;
    c.failure = Some(ProbeFailure {
        category: ErrorCategory::Timeout,
        message: "timed out after 120s".to_string(),
    });

    let metrics = compute_metrics(&[a, b, c], MetricsOptions::default(), &PricingTable::new());

    assert_eq!(metrics.conflicts.total, 2);
    assert_eq!(metrics.conflicts.major, 1);
    assert_eq!(metrics.conflicts.minor, 1);
    assert!((metrics.total_cost_usd - 1.0).abs() < 1e-9);
    assert!((metrics.avg_cost_usd - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.total_duration_ms, 4000);
    assert_eq!(metrics.failed_count, 2);
    assert_eq!(metrics.error_counts[&ErrorCategory::Timeout], 1);
    assert_eq!(metrics.error_counts[&ErrorCategory::PermissionDenied], 1);
    assert!(!metrics.error_counts.contains_key(&ErrorCategory::ApiError));
    // Denials are reported but do not make a probe failed
    assert_eq!(metrics.permission_denied_probes, 1);
}

#[test]
fn test_multi_sample_stats_and_judge_cost() {
    let usage = TokenUsage {
        model: "openai:gpt-4o".to_string(),
        input_tokens: 1_000_000,
        output_tokens: 0,
    };

    let mut steady = result("steady", true, true);
    steady.consensus = Some(aggregate_judgments(
        vec![
            Judgment::new(7.0, TriggerAccuracy::Correct).with_usage(usage.clone()),
            Judgment::new(7.0, TriggerAccuracy::Correct).with_usage(usage.clone()),
        ],
        AggregateMethod::Average,
    ));
    let mut noisy = result("noisy", true, true);
    noisy.consensus = Some(aggregate_judgments(
        vec![
            Judgment::new(9.0, TriggerAccuracy::Correct),
            Judgment::new(2.0, TriggerAccuracy::Incorrect),
        ],
        AggregateMethod::Average,
    ));

    let options = MetricsOptions {
        multi_sample: true,
        ..Default::default()
    };
    let metrics = compute_metrics(&[steady, noisy], options, &PricingTable::new());

    let stats = metrics.multi_sample.expect("multi-sample stats enabled");
    assert_eq!(stats.judged_probes, 2);
    assert_eq!(stats.high_variance_probes, vec!["noisy".to_string()]);
    assert_eq!(stats.consensus_rate, 0.5);
    assert!((metrics.judge_cost_usd - 5.0).abs() < 1e-9);
}

#[test]
fn test_scenario_and_repetition_blocks() {
    let mut direct = result("a", true, true);
    direct.scenario_type = Some("direct".to_string());
    direct.repetition = Some(RepetitionSummary {
        runs: 3,
        triggered_count: 3,
        flaky: false,
    });
    let mut paraphrase = result("b", true, false);
    paraphrase.scenario_type = Some("paraphrase".to_string());
    paraphrase.repetition = Some(RepetitionSummary {
        runs: 3,
        triggered_count: 1,
        flaky: true,
    });
    let mut paraphrase2 = result("c", true, true);
    paraphrase2.scenario_type = Some("paraphrase".to_string());
    paraphrase2.repetition = Some(RepetitionSummary {
        runs: 3,
        triggered_count: 3,
        flaky: false,
    });

    let options = MetricsOptions {
        multi_sample: false,
        scenario_breakdown: true,
        repetitions: true,
    };
    let metrics = compute_metrics(
        &[direct, paraphrase, paraphrase2],
        options,
        &PricingTable::new(),
    );

    let scenarios = metrics.by_scenario.expect("scenario stats enabled");
    assert_eq!(scenarios["direct"].trigger_rate, 1.0);
    assert_eq!(scenarios["paraphrase"].total, 2);
    assert_eq!(scenarios["paraphrase"].trigger_rate, 0.5);

    let repetition = metrics.repetition.expect("repetition stats enabled");
    assert_eq!(repetition.flaky_probes, vec!["b".to_string()]);
    assert!((repetition.consistency_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_metrics_serialize_error_keys_as_names() {
    let mut failed = result("a", true, false);
    failed.failure = Some(ProbeFailure {
        category: ErrorCategory::BudgetExceeded,
        message: "budget".to_string(),
    });
    let metrics = compute_metrics(&[failed], MetricsOptions::default(), &PricingTable::new());
    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["error_counts"]["budget_exceeded"], 1);
}
