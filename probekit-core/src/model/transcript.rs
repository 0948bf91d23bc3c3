//! Transcript events recorded by the execution backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
}

/// One transcript entry, tagged by originator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Message originating from the user (the probe input)
    User { content: Vec<ContentBlock> },

    /// Model output, possibly containing tool calls
    Assistant { content: Vec<ContentBlock> },

    /// Result returned for an earlier tool call
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl TranscriptEvent {
    /// A user message with a single text block
    pub fn user_text(text: impl Into<String>) -> Self {
        TranscriptEvent::User {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant message with a single text block
    pub fn assistant_text(text: impl Into<String>) -> Self {
        TranscriptEvent::Assistant {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant message carrying one tool call
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        TranscriptEvent::Assistant {
            content: vec![ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            }],
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, TranscriptEvent::User { .. })
    }

    /// Concatenated text blocks; empty for tool results
    pub fn text(&self) -> String {
        match self {
            TranscriptEvent::User { content } | TranscriptEvent::Assistant { content } => content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::ToolUse { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            TranscriptEvent::ToolResult { .. } => String::new(),
        }
    }

    /// Tool-use blocks of an assistant message as (id, name, input)
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        let blocks: &[ContentBlock] = match self {
            TranscriptEvent::Assistant { content } => content,
            _ => &[],
        };
        blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            ContentBlock::Text { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_roundtrip_shape() {
        let event = TranscriptEvent::tool_use("tu_1", "Skill", json!({"skill": "commit"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "assistant");
        assert_eq!(value["content"][0]["type"], "tool_use");
        assert_eq!(value["content"][0]["input"]["skill"], "commit");

        let back: TranscriptEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_text_and_tool_uses() {
        let event = TranscriptEvent::Assistant {
            content: vec![
                ContentBlock::Text {
                    text: "Let me check".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "a".to_string(),
                    name: "Task".to_string(),
                    input: json!({"subagent_type": "reviewer"}),
                },
            ],
        };
        assert_eq!(event.text(), "Let me check");
        let uses: Vec<_> = event.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "Task");

        assert_eq!(TranscriptEvent::user_text("hi").tool_uses().count(), 0);
    }
}
