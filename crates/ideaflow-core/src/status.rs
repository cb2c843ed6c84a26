//! Run status and the fixed analysis pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a workflow Run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run created but not yet started.
    #[default]
    Pending,
    /// Run actively executing pipeline stages.
    Running,
    /// Run completed all stages (possibly degraded).
    Completed,
    /// Run failed after retry and fallback exhaustion.
    Failed,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the run is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One discrete analysis stage of the pipeline.
///
/// Stages always execute in the order given by [`Stage::PIPELINE`]; a run
/// visits each stage at most once (bounded internal retries aside).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Crystallize,
    Validate,
    DimensionalAnalysis,
    TeamBuilding,
    FundingAnalysis,
    LegalCompliance,
    MarketAnalysis,
    FinalReport,
}

impl Stage {
    /// The fixed execution order of the pipeline.
    pub const PIPELINE: [Stage; 8] = [
        Stage::Crystallize,
        Stage::Validate,
        Stage::DimensionalAnalysis,
        Stage::TeamBuilding,
        Stage::FundingAnalysis,
        Stage::LegalCompliance,
        Stage::MarketAnalysis,
        Stage::FinalReport,
    ];

    /// The stage that follows this one, or `None` after the final report.
    pub fn next(&self) -> Option<Stage> {
        let idx = Self::PIPELINE.iter().position(|s| s == self)?;
        Self::PIPELINE.get(idx + 1).copied()
    }

    /// Stable wire/display name (matches the serde tag).
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Crystallize => "crystallize",
            Stage::Validate => "validate",
            Stage::DimensionalAnalysis => "dimensional_analysis",
            Stage::TeamBuilding => "team_building",
            Stage::FundingAnalysis => "funding_analysis",
            Stage::LegalCompliance => "legal_compliance",
            Stage::MarketAnalysis => "market_analysis",
            Stage::FinalReport => "final_report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Pending.is_active());
        assert!(RunStatus::Running.is_active());
    }

    #[test]
    fn test_pipeline_order() {
        assert_eq!(Stage::PIPELINE[0], Stage::Crystallize);
        assert_eq!(Stage::PIPELINE[7], Stage::FinalReport);
        assert_eq!(Stage::Crystallize.next(), Some(Stage::Validate));
        assert_eq!(Stage::FinalReport.next(), None);

        // Walking `next` from the first stage covers the whole pipeline.
        let mut walked = vec![Stage::PIPELINE[0]];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked.as_slice(), &Stage::PIPELINE);
    }

    #[test]
    fn test_stage_names_are_snake_case() {
        for stage in Stage::PIPELINE {
            assert!(!stage.name().is_empty());
            assert_eq!(stage.name(), stage.name().to_lowercase());
        }
    }
}
