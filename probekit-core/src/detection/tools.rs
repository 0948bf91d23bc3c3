//! Mapping from tool invocations to plugin components

use serde_json::Value;

use crate::model::{ComponentKind, ComponentRef};

const SKILL_TOOL: &str = "Skill";
const TASK_TOOL: &str = "Task";
const SLASH_COMMAND_TOOL: &str = "SlashCommand";
const MCP_PREFIX: &str = "mcp__";

/// Resolve the component a tool call activated
///
/// Returns the component together with the raw identifier found in the call,
/// which is kept as evidence (it may carry a plugin namespace).
pub fn component_from_tool_call(name: &str, input: &Value) -> Option<(ComponentRef, String)> {
    match name {
        SKILL_TOOL => string_field(input, "skill")
            .map(|id| (ComponentRef::from_identifier(ComponentKind::Skill, id), id.to_string())),
        TASK_TOOL => string_field(input, "subagent_type")
            .map(|id| (ComponentRef::from_identifier(ComponentKind::Agent, id), id.to_string())),
        SLASH_COMMAND_TOOL => string_field(input, "command").and_then(|raw| {
            let id = raw.trim().trim_start_matches('/').split_whitespace().next()?;
            Some((
                ComponentRef::from_identifier(ComponentKind::Command, id),
                id.to_string(),
            ))
        }),
        other => other.strip_prefix(MCP_PREFIX).and_then(|rest| {
            let server = rest.split("__").next().filter(|s| !s.is_empty())?;
            Some((
                ComponentRef::new(ComponentKind::McpServer, server),
                other.to_string(),
            ))
        }),
    }
}

fn string_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skill_tool() {
        let (component, id) =
            component_from_tool_call("Skill", &json!({"skill": "git-tools:commit"})).unwrap();
        assert_eq!(component, ComponentRef::skill("commit"));
        assert_eq!(id, "git-tools:commit");
    }

    #[test]
    fn test_task_tool_maps_to_agent() {
        let (component, _) =
            component_from_tool_call("Task", &json!({"subagent_type": "code-reviewer"})).unwrap();
        assert_eq!(component, ComponentRef::agent("code-reviewer"));
    }

    #[test]
    fn test_slash_command_tool_strips_arguments() {
        let (component, id) = component_from_tool_call(
            "SlashCommand",
            &json!({"command": "/ops:deploy prod --force"}),
        )
        .unwrap();
        assert_eq!(component, ComponentRef::command("deploy"));
        assert_eq!(id, "ops:deploy");
    }

    #[test]
    fn test_mcp_tool_maps_to_server() {
        let (component, _) =
            component_from_tool_call("mcp__github__create_issue", &json!({})).unwrap();
        assert_eq!(component, ComponentRef::new(ComponentKind::McpServer, "github"));
    }

    #[test]
    fn test_unrelated_tools_are_ignored() {
        assert!(component_from_tool_call("Read", &json!({"file_path": "x"})).is_none());
        assert!(component_from_tool_call("Skill", &json!({})).is_none());
        assert!(component_from_tool_call("mcp__", &json!({})).is_none());
    }
}
