//! Trigger detection
//!
//! Turns the raw observations of one probe run into a deduplicated list of
//! fired components, a trigger verdict and a conflict analysis.
//!
//! Sources are consulted in strict priority order:
//!
//! 1. **Realtime captures**: tool invocations observed while the probe ran.
//! 2. **Direct invocation**: a slash-style invocation in the first user
//!    message, only for explicitly invoked component kinds.
//! 3. **Transcript fallback**: tool-use blocks parsed from the transcript.
//!
//! The first source that yields anything wins.

mod conflict;
mod engine;
mod tools;
mod transcript;

pub use conflict::{analyze_conflicts, domain_tokens};
pub use engine::{Detection, DetectionEngine, dedupe_signals};
pub use tools::component_from_tool_call;
pub use transcript::{detect_direct_invocation, parse_invocation, signals_from_transcript};
