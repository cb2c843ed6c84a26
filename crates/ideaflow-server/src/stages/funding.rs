//! Funding analysis: sources and strategy for the idea's domain and stage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use ideaflow_core::{AnalysisBrief, Stage, StageOutput};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

use super::{PipelineStage, StageContext, StageError, StageExecution};

const SYSTEM_PROMPT: &str = "You are a funding and investor-relations expert. Identify \
relevant funding sources for the startup and lay out an evidence-based fundraising \
strategy. Be specific about the sources. Return ONLY JSON.";

const SHAPE: &str = r#"{
  "headline": "<one-line funding thesis>",
  "body": "<funding strategy narrative>",
  "recommendations": ["<specific action or source>", ...]
}"#;

#[derive(Debug, Deserialize)]
struct RawBrief {
    headline: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// The funding-analysis stage.
pub struct FundingStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl FundingStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for FundingStage {
    fn stage(&self) -> Stage {
        Stage::FundingAnalysis
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        let prompt = PromptTemplate::new(
            SYSTEM_PROMPT,
            format!(
                "Analyze funding opportunities for a {} startup at pre-seed stage.\n\nIdea: {}",
                ctx.domain(),
                ctx.refined_text()
            ),
        )
        .with_shape_hint(SHAPE);

        let raw: RawBrief = invoke_json(invoker.as_ref(), &prompt).await?;
        Ok(StageExecution::clean(StageOutput::Funding(AnalysisBrief {
            headline: raw.headline,
            body: raw.body,
            recommendations: raw.recommendations,
        })))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Funding(offline_brief(ctx.domain())))
    }
}

/// Deterministic pre-seed funding checklist, keyed only by domain.
fn offline_brief(domain: &str) -> AnalysisBrief {
    AnalysisBrief {
        headline: format!("Pre-seed funding checklist for a {} startup", domain),
        body: "Research accelerators (YC, Techstars) and relevant angels; prepare a 10-15 \
               slide deck; prioritize warm introductions over cold outreach; target 6-9 \
               months of runway per round."
            .to_string(),
        recommendations: vec![
            "Apply to two accelerator batches with domain overlap".to_string(),
            "Build a list of 20 angels who invested in adjacent companies".to_string(),
            "Draft a one-page memo stating traction, ask and use of funds".to_string(),
        ],
    }
}
