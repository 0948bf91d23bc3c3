//! # Probekit - Trigger Evaluation for Plugin Components
//!
//! Probekit measures whether a plugin's components (skills, agents, commands,
//! hooks, MCP servers) fire when they should and stay quiet when they should
//! not. A run:
//! - analyzes the target plugin and generates probes
//! - executes each probe against an external backend with bounded
//!   concurrency, rate limiting, timeouts and retries
//! - detects which components triggered, in strict source priority
//! - optionally grades quality with k independent judge samples
//! - aggregates run metrics and persists a resumable checkpoint per stage
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use probekit_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(
//! #     analyzer: Arc<dyn Analyzer>,
//! #     generator: Arc<dyn ProbeGenerator>,
//! #     executor: Arc<dyn Executor>,
//! # ) -> Result<()> {
//! probekit_core::logging::init_tracing(None);
//!
//! let ctx = RunContext::load()?;
//! let pipeline = Pipeline::builder(ctx)
//!     .analyzer(analyzer)
//!     .generator(generator)
//!     .executor(executor)
//!     .build()?;
//!
//! let state = pipeline.run("./my-plugin").await?;
//! if let Some(summary) = pipeline.store().load_summary(&state.run_id).await? {
//!     println!("accuracy: {:.2}", summary.metrics.accuracy);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Concurrency**: semaphore-bounded batches, backoff retry, dispatch spacing
//! - **Detection**: realtime captures, then direct invocation, then transcript
//! - **Judge**: multi-sample consensus with variance and unanimity
//! - **Pipeline**: stage state machine with full-snapshot checkpoints, resume
//!   and fast mode

pub mod concurrency;
pub mod config;
pub mod context;
pub mod detection;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod judge;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::concurrency::{
        BatchOutcome, ParallelOptions, RateLimiter, RetryConfig, Transient, run_parallel,
        with_retry, with_retry_notify,
    };
    pub use crate::config::{EvalConfig, JudgeMode};
    pub use crate::context::RunContext;
    pub use crate::detection::{Detection, DetectionEngine};
    pub use crate::error::{ProbekitError, Result};
    pub use crate::evaluation::Evaluator;
    pub use crate::execution::{
        ExecutionError, ExecutionEvent, Executor, ProbeRunner, collect_execution,
    };
    pub use crate::judge::{
        AggregateMethod, ConsensusEvaluator, ConsensusResult, Judge, JudgeError, Judgment,
        TokenUsage, TriggerAccuracy,
    };
    pub use crate::metrics::{EvalMetrics, PricingTable, compute_metrics};
    pub use crate::model::{
        ComponentKind, ComponentRef, ErrorCategory, EvaluationResult, ExecutionRecord,
        ExecutionResult, PluginAnalysis, Probe, Signal, ToolCapture, TranscriptEvent,
    };
    pub use crate::pipeline::{
        Analyzer, EvaluationSummary, FsStateStore, InMemoryStateStore, Pipeline, PipelineStage,
        PipelineState, ProbeGenerator, StateStore,
    };
}
