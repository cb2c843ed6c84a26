//! Legal compliance analysis for the idea's domain and location.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use ideaflow_core::{AnalysisBrief, Stage, StageOutput};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

use super::{PipelineStage, StageContext, StageError, StageExecution};

const SYSTEM_PROMPT: &str = "You are a startup-law and compliance expert. Identify the \
legal and regulatory requirements for the startup. Be thorough but do not give legal \
advice; recommend consulting an attorney for specifics. Return ONLY JSON.";

const SHAPE: &str = r#"{
  "headline": "<one-line compliance posture>",
  "body": "<compliance roadmap narrative>",
  "recommendations": ["<specific requirement or step>", ...]
}"#;

#[derive(Debug, Deserialize)]
struct RawBrief {
    headline: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// The legal-compliance stage.
pub struct LegalStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl LegalStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for LegalStage {
    fn stage(&self) -> Stage {
        Stage::LegalCompliance
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        let location = ctx.location().unwrap_or("United States");
        let prompt = PromptTemplate::new(
            SYSTEM_PROMPT,
            format!(
                "Analyze legal and compliance requirements for a {} startup operating in {}.\n\nIdea: {}",
                ctx.domain(),
                location,
                ctx.refined_text()
            ),
        )
        .with_shape_hint(SHAPE);

        let raw: RawBrief = invoke_json(invoker.as_ref(), &prompt).await?;
        Ok(StageExecution::clean(StageOutput::Legal(AnalysisBrief {
            headline: raw.headline,
            body: raw.body,
            recommendations: raw.recommendations,
        })))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Legal(offline_brief(ctx.domain())))
    }
}

/// Deterministic compliance checklist keyed by domain.
fn offline_brief(domain: &str) -> AnalysisBrief {
    let mut recommendations = vec![
        "Incorporate (commonly a Delaware C-Corp for venture paths)".to_string(),
        "Sign IP assignment agreements with every founder and contractor".to_string(),
        "Publish a privacy policy covering GDPR/CCPA basics".to_string(),
    ];
    match domain {
        "HealthTech" | "Healthcare" => {
            recommendations.push("Assess HIPAA applicability before handling patient data".to_string());
        }
        "Fintech" | "Finance" => {
            recommendations.push("Review PCI-DSS scope and KYC/AML obligations".to_string());
        }
        "EdTech" | "Education" => {
            recommendations.push("Review COPPA/FERPA exposure for minors' data".to_string());
        }
        _ => {}
    }
    AnalysisBrief {
        headline: format!("Baseline compliance checklist for a {} startup", domain),
        body: "Cover incorporation, IP assignment and data privacy first; add domain-specific \
               regimes before launch. Consult an attorney for specifics."
            .to_string(),
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::RefinedConcept;

    #[tokio::test]
    async fn test_fallback_adds_domain_specific_items() {
        let stage = LegalStage::new(None);
        let mut ctx = StageContext::new("a health app", None);
        ctx.concept = Some(RefinedConcept {
            idea_title: "t".into(),
            problem_statement: "p".into(),
            solution_concept: "s".into(),
            target_user: "u".into(),
            core_domain: "HealthTech".into(),
            suggested_location: None,
            suggestions: vec![],
            feasibility_score: 3.0,
        });
        match stage.fallback(&ctx).await.unwrap() {
            StageOutput::Legal(brief) => {
                assert!(brief.recommendations.iter().any(|r| r.contains("HIPAA")));
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
