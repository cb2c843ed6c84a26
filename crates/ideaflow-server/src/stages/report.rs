//! Final report: synthesize every prior analysis into a readiness report.

use std::sync::Arc;

use async_trait::async_trait;

use ideaflow_core::{ReadinessLevel, ReadinessReport, Stage, StageOutput};
use ideaflow_model_sdk::{AdapterError, ModelInvoker, PromptTemplate};

use super::{PipelineStage, StageContext, StageError, StageExecution};

const SYSTEM_PROMPT: &str = "You are a senior startup advisor. Write a concise, actionable \
readiness report from the analyses provided: executive summary, dimensional insights \
(strengths and gaps), team and funding recommendations, compliance roadmap, and prioritized \
next steps. Be specific and data-driven, encouraging yet realistic. Plain text, no markdown \
headers.";

/// The final-report stage.
///
/// The report skeleton (title, domains, scores, readiness) is assembled
/// deterministically from prior stage outputs; only the narrative summary
/// involves the model, and the fallback substitutes a deterministic one.
pub struct ReportStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl ReportStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for ReportStage {
    fn stage(&self) -> Stage {
        Stage::FinalReport
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        let skeleton = assemble_skeleton(ctx);
        let context = analysis_context(ctx, &skeleton);
        let prompt = PromptTemplate::new(
            SYSTEM_PROMPT,
            format!("Generate the startup readiness report from this analysis:\n\n{}", context),
        )
        .with_temperature(0.5)
        .with_max_tokens(1600);

        let summary = invoker.complete(&prompt).await?;
        Ok(StageExecution::clean(StageOutput::FinalReport(
            ReadinessReport { summary, ..skeleton },
        )))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        let skeleton = assemble_skeleton(ctx);
        let summary = analysis_context(ctx, &skeleton);
        Ok(StageOutput::FinalReport(ReadinessReport {
            summary,
            ..skeleton
        }))
    }
}

/// Deterministic report fields from whatever stages have completed.
fn assemble_skeleton(ctx: &StageContext) -> ReadinessReport {
    let title = ctx
        .concept
        .as_ref()
        .map(|c| c.idea_title.clone())
        .or_else(|| ctx.structure.as_ref().map(|s| s.refined_title.clone()))
        .unwrap_or_else(|| super::sentence_title(&ctx.raw_idea, 120));

    let domains = ctx
        .dimensions
        .as_ref()
        .map(|d| d.domains.clone())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| vec![ctx.domain().to_lowercase()]);

    let overall_score = ctx
        .dimensions
        .as_ref()
        .map(|d| d.overall_score())
        .unwrap_or(0.5);

    let feasibility_score = ctx
        .concept
        .as_ref()
        .map(|c| c.feasibility_score)
        .unwrap_or(2.5);

    ReadinessReport {
        title,
        domains,
        overall_score,
        feasibility_score,
        readiness: ReadinessLevel::from_overall(overall_score),
        summary: String::new(),
    }
}

/// Textual digest of every completed analysis, fed to the model and also
/// serving as the degraded-mode summary.
fn analysis_context(ctx: &StageContext, skeleton: &ReadinessReport) -> String {
    let mut out = format!(
        "Idea: {}\nOriginal submission: {}\nDomains: {}\nOverall dimensional score: {:.2}\n\
         Feasibility: {:.1}/5\nReadiness: {}\n",
        skeleton.title,
        ctx.raw_idea,
        skeleton.domains.join(", "),
        skeleton.overall_score,
        skeleton.feasibility_score,
        skeleton.readiness.message(),
    );

    if let Some(dimensions) = &ctx.dimensions {
        out.push_str(&format!(
            "Dimensional scores: clarity {:.2}, significance {:.2}, specificity {:.2}, \
             market validation {:.2}, technical viability {:.2}, differentiation {:.2}, \
             scalability {:.2}.\n",
            dimensions.clarity,
            dimensions.significance,
            dimensions.specificity,
            dimensions.market_validation,
            dimensions.technical_viability,
            dimensions.differentiation,
            dimensions.scalability,
        ));
    }
    if let Some(matches) = &ctx.matches {
        let names: Vec<&str> = matches.iter().take(3).map(|m| m.candidate.name.as_str()).collect();
        out.push_str(&format!(
            "Top collaborator matches: {}.\n",
            if names.is_empty() { "none found".to_string() } else { names.join(", ") }
        ));
    }
    if let Some(funding) = &ctx.funding {
        out.push_str(&format!("Funding: {}\n", funding.headline));
    }
    if let Some(legal) = &ctx.legal {
        out.push_str(&format!("Legal: {}\n", legal.headline));
    }
    if let Some(market) = &ctx.market {
        out.push_str(&format!(
            "Market: viability {:.1}/5 for {} in {} ({} competitors).\n",
            market.viability_score, market.concept, market.location, market.competitor_count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::{DimensionalScore, RefinedConcept};

    fn ctx_with_analysis() -> StageContext {
        let mut ctx = StageContext::new("A mobile app for freelancers to track time", None);
        ctx.concept = Some(RefinedConcept {
            idea_title: "FreelanceTime".into(),
            problem_statement: "p".into(),
            solution_concept: "s".into(),
            target_user: "freelancers".into(),
            core_domain: "SaaS".into(),
            suggested_location: None,
            suggestions: vec![],
            feasibility_score: 4.0,
        });
        let mut dims = DimensionalScore::default();
        dims.significance = 0.8;
        dims.market_validation = 0.7;
        dims.domains = vec!["saas".into(), "productivity".into()];
        ctx.dimensions = Some(dims);
        ctx
    }

    #[tokio::test]
    async fn test_fallback_report_is_complete() {
        let stage = ReportStage::new(None);
        let ctx = ctx_with_analysis();
        match stage.fallback(&ctx).await.unwrap() {
            StageOutput::FinalReport(report) => {
                assert_eq!(report.title, "FreelanceTime");
                assert_eq!(report.domains[0], "saas");
                assert!((0.0..=1.0).contains(&report.overall_score));
                assert!((0.0..=5.0).contains(&report.feasibility_score));
                assert!(!report.summary.is_empty());
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_without_prior_stages_still_reports() {
        let stage = ReportStage::new(None);
        let ctx = StageContext::new("A tiny idea with no analysis yet", None);
        match stage.fallback(&ctx).await.unwrap() {
            StageOutput::FinalReport(report) => {
                assert!(!report.title.is_empty());
                assert!(!report.domains.is_empty());
                assert_eq!(report.feasibility_score, 2.5);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
