//! Dimensional analysis stage: wraps the analyzer.

use std::sync::Arc;

use async_trait::async_trait;

use ideaflow_core::{Stage, StageOutput};
use ideaflow_model_sdk::{AdapterError, ModelInvoker};

use crate::analyzer::DimensionalAnalyzer;

use super::{PipelineStage, StageContext, StageError, StageExecution};

/// The dimensional-analysis stage.
pub struct DimensionsStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl DimensionsStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for DimensionsStage {
    fn stage(&self) -> Stage {
        Stage::DimensionalAnalysis
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        // Feed the validated concept to the analyzer when available; it
        // sharpens the scoring context beyond the raw submission.
        let mut context_parts = Vec::new();
        if let Some(concept) = &ctx.concept {
            context_parts.push(format!(
                "Problem: {}\nSolution: {}",
                concept.problem_statement, concept.solution_concept
            ));
        }
        if let Some(prior) = &ctx.prior_context {
            context_parts.push(prior.clone());
        }
        let combined = if context_parts.is_empty() {
            None
        } else {
            Some(context_parts.join("\n\n"))
        };

        let score =
            DimensionalAnalyzer::analyze(invoker.as_ref(), &ctx.raw_idea, combined.as_deref())
                .await?;
        Ok(StageExecution::clean(StageOutput::Dimensions(score)))
    }

    async fn fallback(&self, _ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Dimensions(DimensionalAnalyzer::fallback()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::score::NEUTRAL_SCORE;

    #[tokio::test]
    async fn test_fallback_is_neutral_and_bounded() {
        let stage = DimensionsStage::new(None);
        let ctx = StageContext::new("an idea", None);
        let output = stage.fallback(&ctx).await.unwrap();
        match output {
            StageOutput::Dimensions(score) => {
                for value in score.numeric_fields() {
                    assert!((0.0..=1.0).contains(&value));
                    assert_eq!(value, NEUTRAL_SCORE);
                }
                assert!(!score.explanations.is_empty());
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
