//! Core data model
//!
//! Probes go in, execution results come back from the executor, evaluation
//! results come out. Everything here is plain serde data; behaviour lives in
//! the detection, judge, metrics and pipeline modules.

mod analysis;
mod component;
mod execution;
mod probe;
mod result;
mod signal;
mod transcript;

pub use analysis::PluginAnalysis;
pub use component::{ComponentKind, ComponentRef};
pub use execution::{
    ErrorCategory, ExecutionErrorRecord, ExecutionOutcome, ExecutionRecord, ExecutionResult,
    ProbeFailure, ToolCapture,
};
pub use probe::Probe;
pub use result::{ConflictAnalysis, ConflictSeverity, EvaluationResult, RepetitionSummary};
pub use signal::{DetectionSource, MAX_CONFIDENCE, Signal};
pub use transcript::{ContentBlock, TranscriptEvent};
