use async_trait::async_trait;
use std::sync::Arc;

use super::store::{EvaluationSummary, FsStateStore, StateStore};
use super::{PipelineStage, PipelineState, merge_records};
use crate::context::RunContext;
use crate::error::{ProbekitError, Result};
use crate::evaluation::Evaluator;
use crate::execution::{Executor, ProbeRunner};
use crate::judge::Judge;
use crate::metrics::{MetricsOptions, compute_metrics};
use crate::model::{PluginAnalysis, Probe};

/// Inspects the target plugin and lists its components
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, target: &str) -> anyhow::Result<PluginAnalysis>;
}

/// Turns an analysis into probes
#[async_trait]
pub trait ProbeGenerator: Send + Sync {
    async fn generate(&self, analysis: &PluginAnalysis) -> anyhow::Result<Vec<Probe>>;
}

/// Drives a run through its stages, checkpointing after each one
pub struct Pipeline {
    ctx: RunContext,
    analyzer: Arc<dyn Analyzer>,
    generator: Arc<dyn ProbeGenerator>,
    runner: ProbeRunner,
    evaluator: Evaluator,
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("runner", &self.runner)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    ctx: RunContext,
    analyzer: Option<Arc<dyn Analyzer>>,
    generator: Option<Arc<dyn ProbeGenerator>>,
    executor: Option<Arc<dyn Executor>>,
    judge: Option<Arc<dyn Judge>>,
    store: Option<Arc<dyn StateStore>>,
}

impl PipelineBuilder {
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ProbeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Without a judge every quality score stays null
    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Defaults to an [`FsStateStore`] under `output.results_dir`
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let missing = |what: &str| ProbekitError::Configuration(format!("Pipeline needs {what}"));
        let analyzer = self.analyzer.ok_or_else(|| missing("an analyzer"))?;
        let generator = self.generator.ok_or_else(|| missing("a probe generator"))?;
        let executor = self.executor.ok_or_else(|| missing("an executor"))?;
        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FsStateStore::new(self.ctx.config.output.results_dir.clone())),
        };

        Ok(Pipeline {
            runner: ProbeRunner::new(executor, &self.ctx),
            evaluator: Evaluator::new(&self.ctx, self.judge),
            ctx: self.ctx,
            analyzer,
            generator,
            store,
        })
    }
}

impl Pipeline {
    pub fn builder(ctx: RunContext) -> PipelineBuilder {
        PipelineBuilder {
            ctx,
            analyzer: None,
            generator: None,
            executor: None,
            judge: None,
            store: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Fresh run against `target` under a new run id
    pub async fn run(&self, target: &str) -> Result<PipelineState> {
        let mut state = PipelineState::new(uuid::Uuid::new_v4().to_string(), target);
        tracing::info!(run_id = %state.run_id, plugin = target, "Starting evaluation run");
        self.store.save(&state).await?;
        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Continue a persisted run from `from`, or from its current stage
    pub async fn resume(&self, run_id: &str, from: Option<PipelineStage>) -> Result<PipelineState> {
        let mut state = self.load_state(run_id).await?;
        let from = from.unwrap_or(state.stage);

        state.resume_from(from)?;
        tracing::info!(
            run_id,
            stage = %from,
            incomplete = state.incomplete_probe_ids().len(),
            "Resuming run"
        );
        self.store.save(&state).await?;
        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Re-run only the probes that failed in the last execution, then re-evaluate
    pub async fn run_fast(&self, run_id: &str) -> Result<PipelineState> {
        let mut state = self.load_state(run_id).await?;
        if state.outputs.execution.is_none() {
            return Err(ProbekitError::InvalidTransition {
                from: state.stage,
                to: PipelineStage::Execution,
                reason: "fast mode needs a completed execution stage".to_string(),
            });
        }

        // Checked before rewinding so an unreachable backend leaves the
        // completed snapshot intact
        self.preflight(&mut state).await?;

        state.resume_from(PipelineStage::Execution)?;
        let failed = state.fast_mode_probe_ids();
        tracing::info!(run_id, failed = failed.len(), "Fast mode re-running failed probes");

        self.execute(&mut state, &failed).await?;
        self.advance(&mut state, PipelineStage::Evaluation).await?;
        self.drive(&mut state).await?;
        Ok(state)
    }

    async fn load_state(&self, run_id: &str) -> Result<PipelineState> {
        self.store
            .load(run_id)
            .await?
            .ok_or_else(|| ProbekitError::StateNotFound(run_id.to_string()))
    }

    /// Record a pipeline-fatal failure, persist it, and hand back the error
    async fn fail(&self, state: &mut PipelineState, message: String) -> ProbekitError {
        let stage = state.stage;
        tracing::error!(run_id = %state.run_id, %stage, error = %message, "Pipeline halted");
        state.mark_failed(message.clone());
        if let Err(e) = self.store.save(state).await {
            tracing::warn!(run_id = %state.run_id, error = %e, "Failed to persist pipeline error");
        }
        ProbekitError::stage(stage, message)
    }

    async fn advance(&self, state: &mut PipelineState, to: PipelineStage) -> Result<()> {
        state.advance_to(to)?;
        self.store.save(state).await?;
        tracing::info!(run_id = %state.run_id, stage = %to, "Stage entered");
        Ok(())
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<()> {
        loop {
            match state.stage {
                PipelineStage::Pending => {}
                PipelineStage::Analysis => {
                    let analyzed = self.analyzer.analyze(&state.plugin_name).await;
                    match analyzed {
                        Ok(analysis) => {
                            tracing::info!(
                                run_id = %state.run_id,
                                components = analysis.components.len(),
                                "Analysis complete"
                            );
                            state.outputs.analysis = Some(analysis);
                        }
                        Err(e) => return Err(self.fail(state, format!("{e:#}")).await),
                    }
                }
                PipelineStage::Generation => {
                    let generated = match &state.outputs.analysis {
                        Some(analysis) => self.generator.generate(analysis).await,
                        None => Err(anyhow::anyhow!("analysis output is missing")),
                    };
                    match generated {
                        Ok(probes) => {
                            tracing::info!(
                                run_id = %state.run_id,
                                probes = probes.len(),
                                "Probes generated"
                            );
                            state.outputs.generation = Some(probes);
                        }
                        Err(e) => return Err(self.fail(state, format!("{e:#}")).await),
                    }
                }
                PipelineStage::Execution => {
                    self.preflight(state).await?;
                    let pending = state.incomplete_probe_ids();
                    self.execute(state, &pending).await?;
                }
                PipelineStage::Evaluation => self.evaluate(state).await?,
                PipelineStage::Complete => return Ok(()),
            }

            if let Some(next) = state.stage.next() {
                self.advance(state, next).await?;
            }
        }
    }

    async fn preflight(&self, state: &mut PipelineState) -> Result<()> {
        match self.runner.preflight().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(state, format!("Executor preflight failed: {e}")).await),
        }
    }

    /// Run `probe_ids` in checkpointed chunks and record the merged execution output
    async fn execute(&self, state: &mut PipelineState, probe_ids: &[String]) -> Result<()> {
        let probes: Vec<Probe> = state
            .probes()
            .iter()
            .filter(|probe| probe_ids.contains(&probe.id))
            .cloned()
            .collect();

        let config = &self.ctx.config.execution;
        let chunk_size = config.checkpoint_interval.max(config.max_concurrency).max(1);
        let mut records = state.execution_records();

        for (index, chunk) in probes.chunks(chunk_size).enumerate() {
            let batch = match self.runner.run_batch(chunk).await {
                Ok(batch) => batch,
                Err(e) => {
                    return Err(self.fail(state, format!("Probe execution aborted: {e}")).await);
                }
            };

            records = merge_records(records, batch);
            state.record_partial_execution(records.clone());
            self.store.save(state).await?;
            tracing::info!(
                run_id = %state.run_id,
                chunk = index + 1,
                executed = records.len(),
                remaining = probes.len().saturating_sub((index + 1) * chunk_size),
                "Execution checkpoint written"
            );
        }

        state.record_execution(records);
        tracing::info!(
            run_id = %state.run_id,
            failed = state.failed_probe_ids.len(),
            "Execution complete"
        );
        Ok(())
    }

    async fn evaluate(&self, state: &mut PipelineState) -> Result<()> {
        let records = state.outputs.execution.clone().unwrap_or_default();
        let results = self.evaluator.evaluate_all(state.probes(), &records).await;

        let options = MetricsOptions::for_run(self.ctx.config(), &results);
        let metrics = compute_metrics(&results, options, self.ctx.pricing());
        tracing::info!(
            run_id = %state.run_id,
            probes = metrics.total_probes,
            accuracy = metrics.accuracy,
            trigger_rate = metrics.trigger_rate,
            failed = metrics.failed_count,
            "Evaluation complete"
        );

        let summary = EvaluationSummary::new(state, metrics, results.clone());
        self.store.save_summary(&summary).await?;
        state.outputs.evaluation = Some(results);
        state.touch();
        Ok(())
    }
}
