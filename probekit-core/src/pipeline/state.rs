use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::PipelineStage;
use crate::error::{ProbekitError, Result};
use crate::model::{EvaluationResult, ExecutionRecord, PluginAnalysis, Probe};

/// Snapshots of what each completed stage produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PluginAnalysis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Vec<Probe>>,

    /// Records of the last completed execution stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<Vec<ExecutionRecord>>,

    /// Records checkpointed while the execution stage is still running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_partial: Option<Vec<ExecutionRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Vec<EvaluationResult>>,
}

impl StageOutputs {
    /// Whether the output `stage` produces is recorded
    pub fn has_output(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Pending | PipelineStage::Complete => true,
            PipelineStage::Analysis => self.analysis.is_some(),
            PipelineStage::Generation => self.generation.is_some(),
            PipelineStage::Execution => self.execution.is_some(),
            PipelineStage::Evaluation => self.evaluation.is_some(),
        }
    }

    fn clear_after(&mut self, stage: PipelineStage) {
        if stage < PipelineStage::Analysis {
            self.analysis = None;
        }
        if stage < PipelineStage::Generation {
            self.generation = None;
        }
        if stage < PipelineStage::Execution {
            self.execution = None;
            self.execution_partial = None;
        }
        if stage < PipelineStage::Evaluation {
            self.evaluation = None;
        }
    }
}

/// Durable progress of one run; the only input resume needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub plugin_name: String,
    pub stage: PipelineStage,
    #[serde(default)]
    pub outputs: StageOutputs,
    /// Probe ids that failed in the last completed execution stage
    #[serde(default)]
    pub failed_probe_ids: Vec<String>,
    /// Pipeline-fatal failure, if the run halted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new(run_id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            plugin_name: plugin_name.into(),
            stage: PipelineStage::Pending,
            outputs: StageOutputs::default(),
            failed_probe_ids: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.stage == PipelineStage::Complete
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn missing_prerequisite(&self, stage: PipelineStage) -> Option<PipelineStage> {
        stage
            .prerequisites()
            .iter()
            .copied()
            .find(|required| !self.outputs.has_output(*required))
    }

    /// Move to the next stage
    ///
    /// Only a step to the immediately following stage is accepted, and only
    /// once that stage's prerequisite outputs are recorded.
    pub fn advance_to(&mut self, stage: PipelineStage) -> Result<()> {
        if self.stage.next() != Some(stage) {
            return Err(ProbekitError::InvalidTransition {
                from: self.stage,
                to: stage,
                reason: "stages advance one step at a time".to_string(),
            });
        }
        if let Some(missing) = self.missing_prerequisite(stage) {
            return Err(ProbekitError::InvalidTransition {
                from: self.stage,
                to: stage,
                reason: format!("{missing} output is missing"),
            });
        }

        self.stage = stage;
        self.touch();
        Ok(())
    }

    /// Whether the run has reached `stage` and can restart it
    pub fn can_resume_from(&self, stage: PipelineStage) -> bool {
        self.stage >= stage && self.missing_prerequisite(stage).is_none()
    }

    /// Rewind to `stage` for a resumed run
    ///
    /// Outputs of later stages are dropped; `stage`'s own outputs are kept so
    /// a partially executed batch can pick up where it stopped.
    pub fn resume_from(&mut self, stage: PipelineStage) -> Result<()> {
        if !self.can_resume_from(stage) {
            let reason = match self.missing_prerequisite(stage) {
                Some(missing) => format!("{missing} output is missing"),
                None => format!("run has only reached {}", self.stage),
            };
            return Err(ProbekitError::InvalidTransition {
                from: self.stage,
                to: stage,
                reason,
            });
        }

        self.outputs.clear_after(stage);
        self.stage = stage;
        self.error = None;
        self.touch();
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.touch();
    }

    pub fn probes(&self) -> &[Probe] {
        self.outputs.generation.as_deref().unwrap_or_default()
    }

    /// Ids to re-run in fast mode: the failures of the last full execution
    pub fn fast_mode_probe_ids(&self) -> Vec<String> {
        self.failed_probe_ids.clone()
    }

    /// Probes with no record in either the full or partial execution output
    pub fn incomplete_probe_ids(&self) -> Vec<String> {
        let executed: HashSet<&str> = self
            .outputs
            .execution
            .iter()
            .chain(self.outputs.execution_partial.iter())
            .flatten()
            .map(|record| record.probe_id.as_str())
            .collect();

        self.probes()
            .iter()
            .filter(|probe| !executed.contains(probe.id.as_str()))
            .map(|probe| probe.id.clone())
            .collect()
    }

    /// Full and partial execution records merged by probe id
    pub fn execution_records(&self) -> Vec<ExecutionRecord> {
        let full = self.outputs.execution.clone().unwrap_or_default();
        match &self.outputs.execution_partial {
            Some(partial) => merge_records(full, partial.clone()),
            None => full,
        }
    }

    /// Checkpoint records produced so far by a running execution stage
    pub fn record_partial_execution(&mut self, records: Vec<ExecutionRecord>) {
        self.outputs.execution_partial = Some(records);
        self.touch();
    }

    /// Record the completed execution stage and recompute failed ids
    pub fn record_execution(&mut self, records: Vec<ExecutionRecord>) {
        self.failed_probe_ids = failed_ids(&records);
        self.outputs.execution = Some(records);
        self.outputs.execution_partial = None;
        self.touch();
    }
}

/// Merge `updates` into `existing`: a probe id present in `updates` has all
/// of its earlier records replaced
pub fn merge_records(
    existing: Vec<ExecutionRecord>,
    updates: Vec<ExecutionRecord>,
) -> Vec<ExecutionRecord> {
    let replaced: HashSet<String> = updates.iter().map(|r| r.probe_id.clone()).collect();
    existing
        .into_iter()
        .filter(|record| !replaced.contains(&record.probe_id))
        .chain(updates)
        .collect()
}

/// Ids with any failed record, in first-seen order
pub fn failed_ids(records: &[ExecutionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| record.is_failed())
        .filter(|record| seen.insert(record.probe_id.as_str()))
        .map(|record| record.probe_id.clone())
        .collect()
}
