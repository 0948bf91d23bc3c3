//! Per-probe evaluation
//!
//! Folds the execution records of one probe (one per repetition) into a single
//! [`EvaluationResult`]: detection on every completed run, majority verdict
//! across runs, and quality judging for the representative run when the judge
//! mode asks for it.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::concurrency::{ParallelOptions, run_parallel};
use crate::config::{JudgeConfig, JudgeMode};
use crate::context::RunContext;
use crate::detection::{Detection, DetectionEngine};
use crate::judge::{ConsensusEvaluator, Judge};
use crate::model::{
    ConflictAnalysis, ErrorCategory, EvaluationResult, ExecutionErrorRecord, ExecutionOutcome,
    ExecutionRecord, ExecutionResult, Probe, ProbeFailure, RepetitionSummary,
};

/// Turns execution records into evaluation results
pub struct Evaluator {
    detection: DetectionEngine,
    consensus: Option<ConsensusEvaluator>,
    judge_config: JudgeConfig,
    max_concurrency: usize,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("detection", &self.detection)
            .field("consensus", &self.consensus)
            .field("judge_mode", &self.judge_config.mode)
            .finish()
    }
}

impl Evaluator {
    /// `judge` is ignored when judging is disabled in the config
    pub fn new(ctx: &RunContext, judge: Option<Arc<dyn Judge>>) -> Self {
        let config = ctx.config();
        let consensus = judge
            .filter(|_| config.judge.enabled)
            .map(|judge| ConsensusEvaluator::new(judge, config.judge.clone()));

        Self {
            detection: DetectionEngine::new(config.detection.clone()),
            consensus,
            judge_config: config.judge.clone(),
            max_concurrency: config.execution.max_concurrency,
        }
    }

    fn should_judge(&self, probe: &Probe, detection: &Detection) -> bool {
        match self.judge_config.mode {
            JudgeMode::Always => true,
            JudgeMode::ProgrammaticFirst => {
                detection.triggered != probe.expect_trigger
                    || detection.triggered
                    || detection.conflict.has_conflict
            }
        }
    }

    /// Evaluate one probe from its records, in repetition order
    pub async fn evaluate_probe(
        &self,
        probe: &Probe,
        records: &[&ExecutionRecord],
    ) -> EvaluationResult {
        let mut completed: Vec<&ExecutionResult> = Vec::new();
        let mut failures: Vec<&ProbeFailure> = Vec::new();
        for record in records {
            match &record.outcome {
                ExecutionOutcome::Completed(result) => completed.push(result),
                ExecutionOutcome::Failed(failure) => failures.push(failure),
            }
        }

        if completed.is_empty() {
            let failure = failures.first().map(|f| (*f).clone()).unwrap_or(ProbeFailure {
                category: ErrorCategory::ApiError,
                message: "Probe was not executed".to_string(),
            });
            return failed_result(probe, failure);
        }

        let detections: Vec<Detection> = completed
            .iter()
            .map(|result| self.detection.detect(result, &probe.component))
            .collect();

        let runs = detections.len() as u32;
        let triggered_count = detections.iter().filter(|d| d.triggered).count() as u32;
        let triggered = match (triggered_count * 2).cmp(&runs) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => detections[0].triggered,
        };
        let representative = detections
            .iter()
            .position(|d| d.triggered == triggered)
            .unwrap_or(0);
        let detection = &detections[representative];
        let result = completed[representative];

        let repetition = (records.len() > 1).then(|| RepetitionSummary {
            runs,
            triggered_count,
            flaky: triggered_count > 0 && triggered_count < runs,
        });

        let consensus = match &self.consensus {
            Some(evaluator) if self.should_judge(probe, detection) => Some(
                evaluator
                    .evaluate(probe, &result.transcript, &detection.signals)
                    .await,
            ),
            _ => None,
        };

        let mut execution_errors: Vec<ExecutionErrorRecord> =
            completed.iter().flat_map(|r| r.errors.iter().cloned()).collect();
        execution_errors.extend(failures.iter().map(|f| ExecutionErrorRecord {
            category: f.category,
            message: f.message.clone(),
        }));

        let mut permission_denials: Vec<String> = Vec::new();
        for tool in completed.iter().flat_map(|r| r.permission_denials.iter()) {
            if !permission_denials.contains(tool) {
                permission_denials.push(tool.clone());
            }
        }

        tracing::debug!(
            probe_id = %probe.id,
            triggered,
            confidence = detection.confidence,
            judged = consensus.is_some(),
            "Probe evaluated"
        );

        EvaluationResult {
            probe_id: probe.id.clone(),
            component: probe.component.clone(),
            expect_trigger: probe.expect_trigger,
            scenario_type: probe.scenario_type.clone(),
            triggered,
            confidence: detection.confidence,
            quality_score: consensus.as_ref().map(|c| c.aggregated_score),
            evidence: detection.evidence(),
            detection_source: detection.source,
            all_triggered_components: detection.components(),
            conflict: detection.conflict.clone(),
            consensus,
            repetition,
            failure: None,
            execution_errors,
            permission_denials,
            cost_usd: completed.iter().map(|r| r.cost_usd).sum(),
            duration_ms: completed.iter().map(|r| r.duration_ms).sum(),
        }
    }

    /// Evaluate every probe; one result per probe, in probe order
    pub async fn evaluate_all(
        &self,
        probes: &[Probe],
        records: &[ExecutionRecord],
    ) -> Vec<EvaluationResult> {
        let mut by_probe: HashMap<&str, Vec<&ExecutionRecord>> = HashMap::new();
        for record in records {
            by_probe.entry(record.probe_id.as_str()).or_default().push(record);
        }
        for runs in by_probe.values_mut() {
            runs.sort_by_key(|r| r.repetition);
        }

        let options = ParallelOptions::<EvaluationResult, Infallible>::new(self.max_concurrency);
        let items: Vec<&Probe> = probes.iter().collect();
        let outcome = run_parallel(items, &options, |_, probe| {
            let runs = by_probe.get(probe.id.as_str()).cloned().unwrap_or_default();
            async move { Ok(self.evaluate_probe(probe, &runs).await) }
        })
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        };
        outcome.into_results().into_iter().flatten().collect()
    }
}

fn failed_result(probe: &Probe, failure: ProbeFailure) -> EvaluationResult {
    EvaluationResult {
        probe_id: probe.id.clone(),
        component: probe.component.clone(),
        expect_trigger: probe.expect_trigger,
        scenario_type: probe.scenario_type.clone(),
        triggered: false,
        confidence: 0,
        quality_score: None,
        evidence: Vec::new(),
        detection_source: None,
        all_triggered_components: Vec::new(),
        conflict: ConflictAnalysis::none(probe.component.clone()),
        consensus: None,
        repetition: None,
        failure: Some(failure),
        execution_errors: Vec::new(),
        permission_denials: Vec::new(),
        cost_usd: 0.0,
        duration_ms: 0,
    }
}
