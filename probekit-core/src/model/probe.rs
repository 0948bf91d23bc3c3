use serde::{Deserialize, Serialize};

use super::ComponentRef;

/// One test input paired with the component it is expected to (not) trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    /// Unique within a run
    pub id: String,

    /// Component the probe is aimed at
    pub component: ComponentRef,

    /// Whether the component is expected to fire
    pub expect_trigger: bool,

    /// Prompt text sent to the execution backend
    pub input: String,

    /// Secondary scenario label (direct, paraphrased, negative, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
}

impl Probe {
    pub fn new(
        id: impl Into<String>,
        component: ComponentRef,
        expect_trigger: bool,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            component,
            expect_trigger,
            input: input.into(),
            scenario_type: None,
        }
    }

    pub fn with_scenario_type(mut self, scenario_type: impl Into<String>) -> Self {
        self.scenario_type = Some(scenario_type.into());
        self
    }
}
