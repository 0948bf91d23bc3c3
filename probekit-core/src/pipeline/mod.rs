//! Checkpointed evaluation pipeline
//!
//! A run moves through `pending → analysis → generation → execution →
//! evaluation → complete`. After every stage the full [`PipelineState`] is
//! written to a [`StateStore`], so an interrupted or failed run can be
//! resumed from any stage whose inputs were recorded. Fast mode re-runs only
//! the probes that failed in the last execution.

mod orchestrator;
mod stage;
mod state;
pub mod store;


pub use orchestrator::{Analyzer, Pipeline, PipelineBuilder, ProbeGenerator};
pub use stage::PipelineStage;
pub use state::{PipelineState, StageOutputs, failed_ids, merge_records};
pub use store::{EvaluationSummary, FsStateStore, InMemoryStateStore, StateStore};
