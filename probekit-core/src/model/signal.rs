use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ComponentRef;

/// Confidence reported by realtime and direct-invocation detections
pub const MAX_CONFIDENCE: u8 = 100;

/// Where a detection came from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Tool invocation observed while the probe was running
    RealtimeCapture,
    /// Slash-style invocation in the first user message
    DirectInvocation,
    /// Tool-use blocks recovered from the recorded transcript
    TranscriptFallback,
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionSource::RealtimeCapture => "realtime_capture",
            DetectionSource::DirectInvocation => "direct_invocation",
            DetectionSource::TranscriptFallback => "transcript_fallback",
        };
        f.write_str(s)
    }
}

/// One observed activation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: DetectionSource,
    pub component: ComponentRef,
    /// 0-100
    pub confidence: u8,
    pub evidence: String,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        source: DetectionSource,
        component: ComponentRef,
        confidence: u8,
        evidence: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            component,
            confidence: confidence.min(MAX_CONFIDENCE),
            evidence: evidence.into(),
            timestamp,
        }
    }
}
