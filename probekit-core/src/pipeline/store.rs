//! Run state persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;

use super::PipelineState;
use crate::error::{ProbekitError, Result};
use crate::metrics::EvalMetrics;
use crate::model::EvaluationResult;

const STATE_FILE: &str = "state.json";
const SUMMARY_FILE: &str = "evaluation.json";

/// Metrics plus every evaluation result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub run_id: String,
    pub plugin_name: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: EvalMetrics,
    pub results: Vec<EvaluationResult>,
}

impl EvaluationSummary {
    pub fn new(
        state: &PipelineState,
        metrics: EvalMetrics,
        results: Vec<EvaluationResult>,
    ) -> Self {
        Self {
            run_id: state.run_id.clone(),
            plugin_name: state.plugin_name.clone(),
            generated_at: Utc::now(),
            metrics,
            results,
        }
    }
}

/// Trait for run state storage backends
///
/// Every save replaces the whole document for the run id.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Latest snapshot for a run
    async fn load(&self, run_id: &str) -> Result<Option<PipelineState>>;

    /// Overwrite the snapshot for `state.run_id`
    async fn save(&self, state: &PipelineState) -> Result<()>;

    async fn save_summary(&self, summary: &EvaluationSummary) -> Result<()>;

    async fn load_summary(&self, run_id: &str) -> Result<Option<EvaluationSummary>>;
}

/// JSON files under `<root>/<run_id>/`
#[derive(Debug, Clone)]
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        let valid = !run_id.is_empty()
            && run_id != "."
            && run_id != ".."
            && !run_id.contains(['/', '\\']);
        if !valid {
            return Err(ProbekitError::Storage(format!("Invalid run id: {run_id:?}")));
        }
        Ok(self.root.join(run_id))
    }

    async fn write_json<T: Serialize>(&self, run_id: &str, file: &str, value: &T) -> Result<()> {
        let dir = self.run_dir(run_id)?;
        let json = serde_json::to_vec_pretty(value)?;
        let target = dir.join(file);

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &json))
            .await
            .map_err(|e| ProbekitError::Storage(format!("Write task failed: {e}")))??;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned + Send + 'static>(
        &self,
        run_id: &str,
        file: &str,
    ) -> Result<Option<T>> {
        let path = self.run_dir(run_id)?.join(file);

        let bytes = tokio::task::spawn_blocking(move || match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
        .await
        .map_err(|e| ProbekitError::Storage(format!("Read task failed: {e}")))??;

        bytes
            .map(|bytes| serde_json::from_slice(&bytes).map_err(ProbekitError::from))
            .transpose()
    }
}

/// Temp file in the target directory, then rename over the target
fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn load(&self, run_id: &str) -> Result<Option<PipelineState>> {
        self.read_json(run_id, STATE_FILE).await
    }

    async fn save(&self, state: &PipelineState) -> Result<()> {
        self.write_json(&state.run_id, STATE_FILE, state).await?;
        tracing::debug!(run_id = %state.run_id, stage = %state.stage, "State checkpoint written");
        Ok(())
    }

    async fn save_summary(&self, summary: &EvaluationSummary) -> Result<()> {
        self.write_json(&summary.run_id, SUMMARY_FILE, summary).await
    }

    async fn load_summary(&self, run_id: &str) -> Result<Option<EvaluationSummary>> {
        self.read_json(run_id, SUMMARY_FILE).await
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, PipelineState>>>,
    summaries: Arc<RwLock<HashMap<String, EvaluationSummary>>>,
    saves: Arc<RwLock<usize>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state snapshots written so far
    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, run_id: &str) -> Result<Option<PipelineState>> {
        Ok(self.states.read().await.get(run_id).cloned())
    }

    async fn save(&self, state: &PipelineState) -> Result<()> {
        self.states
            .write()
            .await
            .insert(state.run_id.clone(), state.clone());
        *self.saves.write().await += 1;
        Ok(())
    }

    async fn save_summary(&self, summary: &EvaluationSummary) -> Result<()> {
        self.summaries
            .write()
            .await
            .insert(summary.run_id.clone(), summary.clone());
        Ok(())
    }

    async fn load_summary(&self, run_id: &str) -> Result<Option<EvaluationSummary>> {
        Ok(self.summaries.read().await.get(run_id).cloned())
    }
}
