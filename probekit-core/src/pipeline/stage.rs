use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages in execution order
///
/// A state's `stage` is the stage being entered or run; outputs of every
/// earlier stage are already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    Analysis,
    Generation,
    Execution,
    Evaluation,
    Complete,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::Pending,
        PipelineStage::Analysis,
        PipelineStage::Generation,
        PipelineStage::Execution,
        PipelineStage::Evaluation,
        PipelineStage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Pending => "pending",
            PipelineStage::Analysis => "analysis",
            PipelineStage::Generation => "generation",
            PipelineStage::Execution => "execution",
            PipelineStage::Evaluation => "evaluation",
            PipelineStage::Complete => "complete",
        }
    }

    /// The stage after this one (`Complete` is terminal)
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Pending => Some(PipelineStage::Analysis),
            PipelineStage::Analysis => Some(PipelineStage::Generation),
            PipelineStage::Generation => Some(PipelineStage::Execution),
            PipelineStage::Execution => Some(PipelineStage::Evaluation),
            PipelineStage::Evaluation => Some(PipelineStage::Complete),
            PipelineStage::Complete => None,
        }
    }

    /// Stages whose outputs must exist before this stage may be entered
    pub fn prerequisites(&self) -> &'static [PipelineStage] {
        match self {
            PipelineStage::Pending | PipelineStage::Analysis => &[],
            PipelineStage::Generation => &[PipelineStage::Analysis],
            PipelineStage::Execution => &[PipelineStage::Analysis, PipelineStage::Generation],
            PipelineStage::Evaluation => &[PipelineStage::Generation, PipelineStage::Execution],
            PipelineStage::Complete => &[PipelineStage::Evaluation],
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown pipeline stage: {s}"))
    }
}
