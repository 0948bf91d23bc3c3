//! Pull-based collection of streamed executor output

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ExecutionError;
use crate::model::{ErrorCategory, ExecutionResult, ToolCapture, TranscriptEvent};

/// One message from a streaming backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Transcript entry, in conversation order
    Transcript { event: TranscriptEvent },
    /// Tool invocation observed while it happened
    ToolCaptured { capture: ToolCapture },
    PermissionDenied { tool: String },
    Error {
        category: ErrorCategory,
        message: String,
    },
    /// Final accounting; later values replace earlier ones
    Usage { cost_usd: f64, duration_ms: u64 },
    /// Backend finished; anything after is ignored
    Done,
}

/// Drain `events` into an [`ExecutionResult`]
///
/// `cancel` is checked before every pull. Cancellation yields a
/// timeout-category error and drops whatever was collected. The stream ends
/// at [`ExecutionEvent::Done`] or when every sender is gone.
pub async fn collect_execution(
    probe_id: impl Into<String>,
    events: &mut mpsc::Receiver<ExecutionEvent>,
    cancel: &CancellationToken,
) -> Result<ExecutionResult, ExecutionError> {
    let mut result = ExecutionResult::new(probe_id);

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutionError::cancelled()),
            event = events.recv() => event,
        };

        match event {
            None | Some(ExecutionEvent::Done) => break,
            Some(ExecutionEvent::Transcript { event }) => result.transcript.push(event),
            Some(ExecutionEvent::ToolCaptured { capture }) => result.captures.push(capture),
            Some(ExecutionEvent::PermissionDenied { tool }) => result.permission_denials.push(tool),
            Some(ExecutionEvent::Error { category, message }) => {
                result = result.with_error(category, message);
            }
            Some(ExecutionEvent::Usage {
                cost_usd,
                duration_ms,
            }) => result = result.with_cost(cost_usd, duration_ms),
        }
    }

    tracing::trace!(
        probe_id = %result.probe_id,
        events = result.transcript.len(),
        captures = result.captures.len(),
        "Execution stream collected"
    );
    Ok(result)
}
