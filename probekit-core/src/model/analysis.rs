use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ComponentRef;

/// What the analyzer found in the target plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginAnalysis {
    pub plugin_name: String,
    /// Components probes will be generated for
    pub components: Vec<ComponentRef>,
    /// Analyzer-specific details (descriptions, trigger phrases, ...)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl PluginAnalysis {
    pub fn new(plugin_name: impl Into<String>, components: Vec<ComponentRef>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            components,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
