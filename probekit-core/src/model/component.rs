//! Component identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of plugin component a probe targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Skill,
    Agent,
    Command,
    Hook,
    McpServer,
}

impl ComponentKind {
    /// Whether the component is fired by the user typing an explicit invocation
    /// (for example `/plugin:deploy`) rather than being chosen by the model.
    pub fn is_explicit_invocation(&self) -> bool {
        matches!(self, ComponentKind::Command)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Skill => "skill",
            ComponentKind::Agent => "agent",
            ComponentKind::Command => "command",
            ComponentKind::Hook => "hook",
            ComponentKind::McpServer => "mcp_server",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (kind, name) pair identifying one component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    pub kind: ComponentKind,
    pub name: String,
}

impl ComponentRef {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Build from a possibly namespaced identifier (`plugin:name`), keeping only
    /// the final segment as the component name.
    pub fn from_identifier(kind: ComponentKind, identifier: &str) -> Self {
        Self::new(kind, strip_namespace(identifier))
    }

    pub fn skill(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Skill, name)
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Agent, name)
    }

    pub fn command(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Command, name)
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// `plugin:deploy` -> `deploy`, `deploy` -> `deploy`
pub(crate) fn strip_namespace(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    trimmed.rsplit(':').next().unwrap_or(trimmed)
}
