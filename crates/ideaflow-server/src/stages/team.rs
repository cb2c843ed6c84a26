//! Team building: rank compatible collaborators for the idea.

use std::sync::Arc;

use async_trait::async_trait;

use ideaflow_core::{Stage, StageOutput};

use crate::matching::MatchingEngine;

use super::{PipelineStage, StageContext, StageError, StageExecution};

/// The team-building stage, backed by the matching engine.
pub struct TeamStage {
    engine: Arc<MatchingEngine>,
    top_k: usize,
    /// Whether a model backend is configured at all; without one the
    /// heuristic path is the only path and the stage reports degraded.
    model_configured: bool,
}

impl TeamStage {
    pub fn new(engine: Arc<MatchingEngine>, top_k: usize, model_configured: bool) -> Self {
        Self {
            engine,
            top_k,
            model_configured,
        }
    }
}

#[async_trait]
impl PipelineStage for TeamStage {
    fn stage(&self) -> Stage {
        Stage::TeamBuilding
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        if !self.model_configured {
            // Run the heuristic path but surface it as a degradation.
            let output = self.fallback(ctx).await?;
            return Ok(StageExecution {
                output,
                degraded: true,
            });
        }
        let matches = self
            .engine
            .find_matches(&ctx.refined_text(), self.top_k, None)
            .await;
        Ok(StageExecution::clean(StageOutput::TeamBuilding(matches)))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        // The engine degrades per candidate internally, so the fallback is
        // the same aggregation; profile sources carry no model dependency.
        let matches = self
            .engine
            .find_matches(&ctx.refined_text(), self.top_k, None)
            .await;
        Ok(StageOutput::TeamBuilding(matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{DirectorySource, ProfileSource, SynthesizedSource};
    use std::time::Duration;

    fn engine() -> Arc<MatchingEngine> {
        let sources: Vec<Arc<dyn ProfileSource>> = vec![
            Arc::new(DirectorySource::seeded()),
            Arc::new(SynthesizedSource::new(None)),
        ];
        Arc::new(MatchingEngine::new(sources, None, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_unconfigured_model_marks_degraded() {
        let stage = TeamStage::new(engine(), 5, false);
        let ctx = StageContext::new("AI SaaS for freelancers needing marketing help", None);
        let execution = stage.execute(&ctx).await.unwrap();
        assert!(execution.degraded);
        match execution.output {
            StageOutput::TeamBuilding(matches) => {
                assert!(!matches.is_empty());
                assert!(matches.len() <= 5);
                for pair in matches.windows(2) {
                    assert!(pair[0].score >= pair[1].score);
                }
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
