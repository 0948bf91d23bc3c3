use std::collections::HashSet;

use super::conflict::analyze_conflicts;
use super::tools::component_from_tool_call;
use super::transcript::{detect_direct_invocation, signals_from_transcript};
use crate::config::DetectionConfig;
use crate::model::{
    ComponentRef, ConflictAnalysis, DetectionSource, ExecutionResult, MAX_CONFIDENCE, Signal,
};

/// Outcome of detection for one probe run
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Deduplicated signals from the winning source, first-seen order
    pub signals: Vec<Signal>,
    /// Source of the matching signal, or of whatever was detected
    pub source: Option<DetectionSource>,
    pub triggered: bool,
    pub confidence: u8,
    pub conflict: ConflictAnalysis,
}

impl Detection {
    /// Triggered components, in detection order
    pub fn components(&self) -> Vec<ComponentRef> {
        self.signals.iter().map(|s| s.component.clone()).collect()
    }

    pub fn evidence(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.evidence.clone()).collect()
    }
}

/// Collapse signals sharing a (kind, name) key, keeping the first occurrence
pub fn dedupe_signals(signals: Vec<Signal>) -> Vec<Signal> {
    let mut seen = HashSet::new();
    signals
        .into_iter()
        .filter(|signal| seen.insert(signal.component.clone()))
        .collect()
}

/// Priority-ordered trigger detection
#[derive(Debug, Clone, Default)]
pub struct DetectionEngine {
    config: DetectionConfig,
}

impl DetectionEngine {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Realtime captures mapped to components
    pub fn realtime_signals(&self, result: &ExecutionResult) -> Vec<Signal> {
        result
            .captures
            .iter()
            .filter_map(|capture| {
                let (component, identifier) =
                    component_from_tool_call(&capture.name, &capture.input)?;
                Some(Signal::new(
                    DetectionSource::RealtimeCapture,
                    component,
                    MAX_CONFIDENCE,
                    format!("{} invoked ({}): {}", capture.name, capture.tool_use_id, identifier),
                    capture.timestamp,
                ))
            })
            .collect()
    }

    /// Raw signals from the highest-priority source that produced any
    pub fn collect_signals(
        &self,
        result: &ExecutionResult,
        expected: &ComponentRef,
    ) -> Vec<Signal> {
        let realtime = self.realtime_signals(result);
        if !realtime.is_empty() {
            return realtime;
        }

        if let Some(direct) = detect_direct_invocation(&result.transcript, expected) {
            return vec![direct];
        }

        signals_from_transcript(&result.transcript, self.config.transcript_confidence)
    }

    /// Detect which components fired and whether the expected one did
    pub fn detect(&self, result: &ExecutionResult, expected: &ComponentRef) -> Detection {
        let signals = dedupe_signals(self.collect_signals(result, expected));
        let matched = signals.iter().find(|s| s.component == *expected);

        let triggered = matched.is_some();
        let confidence = matched.map_or(MAX_CONFIDENCE, |s| s.confidence);
        let source = matched.or_else(|| signals.first()).map(|s| s.source);

        let components: Vec<ComponentRef> = signals.iter().map(|s| s.component.clone()).collect();
        let conflict = analyze_conflicts(expected, &components, self.config.min_shared_token_len);

        tracing::trace!(
            probe_id = %result.probe_id,
            triggered,
            detections = signals.len(),
            has_conflict = conflict.has_conflict,
            "Detection complete"
        );

        Detection {
            signals,
            source,
            triggered,
            confidence,
            conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConflictSeverity, ToolCapture, TranscriptEvent};
    use chrono::Utc;
    use serde_json::json;

    fn engine() -> DetectionEngine {
        DetectionEngine::new(DetectionConfig::default())
    }

    fn skill_capture(name: &str, id: &str) -> ToolCapture {
        ToolCapture::new("Skill", json!({ "skill": name }), id)
    }

    #[test]
    fn test_realtime_capture_triggers_expected() {
        let result = ExecutionResult::new("p1").with_capture(skill_capture("commit", "tu_1"));
        let detection = engine().detect(&result, &ComponentRef::skill("commit"));

        assert!(detection.triggered);
        assert_eq!(detection.confidence, 100);
        assert_eq!(detection.source, Some(DetectionSource::RealtimeCapture));
        assert!(!detection.conflict.has_conflict);
    }

    #[test]
    fn test_direct_invocation_path() {
        let result = ExecutionResult::new("p2")
            .with_transcript(vec![TranscriptEvent::user_text("/plugin:deploy prod")]);
        let detection = engine().detect(&result, &ComponentRef::command("deploy"));

        assert!(detection.triggered);
        assert_eq!(detection.source, Some(DetectionSource::DirectInvocation));
        assert_eq!(detection.confidence, 100);
    }

    #[test]
    fn test_unexpected_capture_is_conflict() {
        let result = ExecutionResult::new("p3").with_capture(skill_capture("other-skill", "tu_1"));
        let detection = engine().detect(&result, &ComponentRef::skill("my-skill"));

        assert!(!detection.triggered);
        assert!(detection.conflict.has_conflict);
        assert!(
            detection
                .conflict
                .triggered
                .iter()
                .any(|c| c.name == "other-skill")
        );
        assert_ne!(detection.conflict.severity, ConflictSeverity::None);
    }

    #[test]
    fn test_realtime_priority_is_absolute() {
        // Transcript and first message point elsewhere; the capture wins alone.
        let result = ExecutionResult::new("p4")
            .with_capture(ToolCapture::new(
                "SlashCommand",
                json!({"command": "/ops:status"}),
                "tu_1",
            ))
            .with_transcript(vec![
                TranscriptEvent::user_text("/ops:deploy prod"),
                TranscriptEvent::tool_use("t9", "Skill", json!({"skill": "release"})),
            ]);
        let detection = engine().detect(&result, &ComponentRef::command("deploy"));

        assert!(!detection.triggered);
        assert_eq!(detection.components(), vec![ComponentRef::command("status")]);
        assert!(
            detection
                .signals
                .iter()
                .all(|s| s.source == DetectionSource::RealtimeCapture)
        );
    }

    #[test]
    fn test_transcript_fallback_only_when_nothing_else() {
        let result = ExecutionResult::new("p5").with_transcript(vec![
            TranscriptEvent::user_text("write a commit message"),
            TranscriptEvent::tool_use("t1", "Skill", json!({"skill": "commit"})),
        ]);
        let detection = engine().detect(&result, &ComponentRef::skill("commit"));

        assert!(detection.triggered);
        assert_eq!(detection.source, Some(DetectionSource::TranscriptFallback));
        assert_eq!(detection.confidence, DetectionConfig::default().transcript_confidence);
    }

    #[test]
    fn test_dedupe_keeps_first_evidence() {
        let result = ExecutionResult::new("p6")
            .with_capture(skill_capture("commit", "first"))
            .with_capture(skill_capture("plugin:commit", "second"))
            .with_capture(skill_capture("review", "third"));
        let detection = engine().detect(&result, &ComponentRef::skill("commit"));

        assert_eq!(detection.signals.len(), 2);
        assert!(detection.signals[0].evidence.contains("first"));
        assert_eq!(
            detection.components(),
            vec![ComponentRef::skill("commit"), ComponentRef::skill("review")]
        );
    }

    #[test]
    fn test_dedupe_signals_order() {
        let now = Utc::now();
        let signal = |name: &str, evidence: &str| {
            Signal::new(
                DetectionSource::RealtimeCapture,
                ComponentRef::skill(name),
                100,
                evidence,
                now,
            )
        };
        let deduped = dedupe_signals(vec![
            signal("a", "a1"),
            signal("b", "b1"),
            signal("a", "a2"),
        ]);
        let evidence: Vec<_> = deduped.iter().map(|s| s.evidence.as_str()).collect();
        assert_eq!(evidence, vec!["a1", "b1"]);
    }

    #[test]
    fn test_nothing_detected() {
        let result = ExecutionResult::new("p7")
            .with_transcript(vec![TranscriptEvent::user_text("hello")]);
        let detection = engine().detect(&result, &ComponentRef::skill("commit"));

        assert!(!detection.triggered);
        assert_eq!(detection.source, None);
        assert_eq!(detection.confidence, 100);
        assert!(!detection.conflict.has_conflict);
    }
}
