//! The stage library: one module per pipeline stage.
//!
//! Every stage implements [`PipelineStage`]: a model-backed `execute` path
//! and a deterministic `fallback` path with no external dependency. The
//! orchestrator decides which path runs and tags the result accordingly,
//! making degradation visible in the interface instead of hidden in error
//! handling.

mod crystallize;
mod dimensions;
mod funding;
mod legal;
mod market;
mod report;
mod team;
mod validate;

pub use crystallize::CrystallizeStage;
pub use dimensions::DimensionsStage;
pub use funding::FundingStage;
pub use legal::LegalStage;
pub use market::{MarketCache, MarketStage};
pub use report::ReportStage;
pub use team::TeamStage;
pub use validate::ValidateStage;

use async_trait::async_trait;
use thiserror::Error;

use ideaflow_core::{
    AnalysisBrief, DimensionalScore, IdeaStructure, MarketProfile, MatchResult, RefinedConcept,
    Stage, StageOutput,
};
use ideaflow_model_sdk::AdapterError;

/// Failure of a stage attempt.
#[derive(Debug, Error)]
pub enum StageError {
    /// The model backend failed; classification decides retry vs fallback.
    #[error("upstream failure: {0}")]
    Upstream(#[from] AdapterError),

    /// Internal failure with no model involvement.
    #[error("{0}")]
    Internal(String),
}

impl StageError {
    /// Whether the orchestrator should retry this attempt.
    ///
    /// Only rate limits are worth retrying at the stage level: parse
    /// failures already consumed their single repair attempt inside the
    /// adapter, and retrying a down backend wastes the stage's time budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Upstream(AdapterError::RateLimited { .. })
        )
    }
}

/// Successful stage execution, with an explicit degradation hint for
/// stages that absorb partial upstream failure internally.
#[derive(Debug)]
pub struct StageExecution {
    pub output: StageOutput,
    pub degraded: bool,
}

impl StageExecution {
    pub fn clean(output: StageOutput) -> Self {
        Self {
            output,
            degraded: false,
        }
    }
}

/// Accumulated run state passed to each stage.
///
/// Each stage is a pure function of this context plus its own backends;
/// the orchestrator absorbs every output back into the context before the
/// next stage runs.
#[derive(Debug, Default, Clone)]
pub struct StageContext {
    pub raw_idea: String,
    /// Summary of prior runs in the same conversation, if any.
    pub prior_context: Option<String>,
    pub structure: Option<IdeaStructure>,
    pub concept: Option<RefinedConcept>,
    pub dimensions: Option<DimensionalScore>,
    pub matches: Option<Vec<MatchResult>>,
    pub funding: Option<AnalysisBrief>,
    pub legal: Option<AnalysisBrief>,
    pub market: Option<MarketProfile>,
}

impl StageContext {
    /// Start a context for a new submission.
    pub fn new(raw_idea: impl Into<String>, prior_context: Option<String>) -> Self {
        Self {
            raw_idea: raw_idea.into(),
            prior_context,
            ..Self::default()
        }
    }

    /// Absorb a completed stage's output.
    pub fn absorb(&mut self, output: &StageOutput) {
        match output {
            StageOutput::Crystallized(s) => self.structure = Some(s.clone()),
            StageOutput::Validated(c) => self.concept = Some(c.clone()),
            StageOutput::Dimensions(d) => self.dimensions = Some(d.clone()),
            StageOutput::TeamBuilding(m) => self.matches = Some(m.clone()),
            StageOutput::Funding(b) => self.funding = Some(b.clone()),
            StageOutput::Legal(b) => self.legal = Some(b.clone()),
            StageOutput::Market(p) => self.market = Some(p.clone()),
            StageOutput::FinalReport(_) => {}
        }
    }

    /// Best-known domain label, preferring the validated concept.
    pub fn domain(&self) -> &str {
        if let Some(concept) = &self.concept {
            return &concept.core_domain;
        }
        if let Some(structure) = &self.structure {
            return &structure.core_domain;
        }
        "Other"
    }

    /// Best-known target location.
    pub fn location(&self) -> Option<&str> {
        self.concept
            .as_ref()
            .and_then(|c| c.suggested_location.as_deref())
    }

    /// Refined idea text used by downstream prompts: the validated title
    /// plus solution when available, else the raw submission.
    pub fn refined_text(&self) -> String {
        match &self.concept {
            Some(concept) => format!("{}: {}", concept.idea_title, concept.solution_concept),
            None => self.raw_idea.clone(),
        }
    }
}

/// One discrete analysis step in the orchestration pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Which pipeline slot this stage fills.
    fn stage(&self) -> Stage;

    /// The full-fidelity path, usually model-backed.
    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError>;

    /// The deterministic heuristic path. Must not depend on any external
    /// backend; failure here fails the run.
    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError>;
}

/// Take the first sentence of a text as a title, capped at `max` chars.
pub(crate) fn sentence_title(text: &str, max: usize) -> String {
    let text = text.trim();
    let sentence = text
        .split(['.', '!', '?', '\n'])
        .next()
        .unwrap_or(text)
        .trim();
    let source = if sentence.is_empty() { text } else { sentence };
    source.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_title() {
        assert_eq!(sentence_title("An app. For people.", 120), "An app");
        assert_eq!(sentence_title("No punctuation here", 120), "No punctuation here");
        assert_eq!(sentence_title("abcdef", 3), "abc");
    }

    #[test]
    fn test_context_domain_preference() {
        let mut ctx = StageContext::new("idea", None);
        assert_eq!(ctx.domain(), "Other");

        ctx.structure = Some(IdeaStructure {
            refined_title: "t".into(),
            core_domain: "Finance".into(),
            target_vertical: "v".into(),
            tech_stack: vec![],
            regulatory_needs: vec![],
            co_founder_roles: vec![],
            search_queries: Default::default(),
        });
        assert_eq!(ctx.domain(), "Finance");

        ctx.concept = Some(RefinedConcept {
            idea_title: "t".into(),
            problem_statement: "p".into(),
            solution_concept: "s".into(),
            target_user: "u".into(),
            core_domain: "Fintech".into(),
            suggested_location: Some("London".into()),
            suggestions: vec![],
            feasibility_score: 3.0,
        });
        assert_eq!(ctx.domain(), "Fintech");
        assert_eq!(ctx.location(), Some("London"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StageError::Upstream(AdapterError::RateLimited { attempts: 3 }).is_retryable());
        assert!(!StageError::Upstream(AdapterError::Unavailable("down".into())).is_retryable());
        assert!(!StageError::Upstream(AdapterError::Parse("bad".into())).is_retryable());
        assert!(!StageError::Internal("oops".into()).is_retryable());
    }
}
