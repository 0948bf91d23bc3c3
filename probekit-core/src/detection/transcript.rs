//! Transcript-derived detections: direct invocations and tool-use fallback

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use super::tools::component_from_tool_call;
use crate::model::{
    ComponentKind, ComponentRef, DetectionSource, MAX_CONFIDENCE, Signal, TranscriptEvent,
};

/// Leading `/identifier` or `/namespace:identifier`, followed by whitespace or end
static INVOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*/((?:[A-Za-z0-9_.-]+:)*[A-Za-z0-9_.-]+)(?:\s|$)").unwrap()
});

/// Extract the invoked identifier from a message, e.g. `plugin:deploy` from
/// `/plugin:deploy prod`
pub fn parse_invocation(text: &str) -> Option<&str> {
    INVOCATION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scan the first user message for an explicit invocation
///
/// Only consulted for explicitly invoked component kinds; anything else
/// returns `None` without looking at the transcript.
pub fn detect_direct_invocation(
    transcript: &[TranscriptEvent],
    expected: &ComponentRef,
) -> Option<Signal> {
    if !expected.kind.is_explicit_invocation() {
        return None;
    }

    let first_user = transcript.iter().find(|event| event.is_user())?;
    let text = first_user.text();
    let identifier = parse_invocation(&text)?;

    Some(Signal::new(
        DetectionSource::DirectInvocation,
        ComponentRef::from_identifier(ComponentKind::Command, identifier),
        MAX_CONFIDENCE,
        format!("Direct invocation: /{identifier}"),
        Utc::now(),
    ))
}

/// Every component-activating tool call recorded in the transcript
pub fn signals_from_transcript(transcript: &[TranscriptEvent], confidence: u8) -> Vec<Signal> {
    let now = Utc::now();
    transcript
        .iter()
        .flat_map(|event| event.tool_uses())
        .filter_map(|(id, name, input)| {
            let (component, identifier) = component_from_tool_call(name, input)?;
            Some(Signal::new(
                DetectionSource::TranscriptFallback,
                component,
                confidence,
                format!("Transcript {name} call {id}: {identifier}"),
                now,
            ))
        })
        .collect()
}
