//! Workflow runs and per-stage output payloads.

use crate::ids::{ConversationId, RunId, TeamId};
use crate::profile::MatchResult;
use crate::score::DimensionalScore;
use crate::status::{RunStatus, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search queries derived from a crystallized idea, one per target surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQueries {
    /// Repository/developer search query (e.g. `language:rust topic:fintech`).
    pub repository: String,
    /// Event-listing search query.
    pub events: String,
}

/// Structured blueprint produced by the crystallize stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaStructure {
    /// Professional name for the concept.
    pub refined_title: String,
    /// Broad industry category.
    pub core_domain: String,
    /// Specific niche within the domain.
    pub target_vertical: String,
    /// Required technologies, at most five.
    pub tech_stack: Vec<String>,
    /// Compliance requirements implied by the domain.
    pub regulatory_needs: Vec<String>,
    /// Critical roles the founding team still needs.
    pub co_founder_roles: Vec<String>,
    pub search_queries: SearchQueries,
}

/// Investor-ready concept profile produced by the validate stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedConcept {
    /// Memorable title, at most 120 characters.
    pub idea_title: String,
    pub problem_statement: String,
    pub solution_concept: String,
    pub target_user: String,
    /// One of: Fintech, HealthTech, EdTech, SaaS, E-commerce, ClimateTech, Other.
    pub core_domain: String,
    pub suggested_location: Option<String>,
    /// Two to four actionable suggestions for sharpening the idea.
    pub suggestions: Vec<String>,
    /// Initial feasibility, `[0.0, 5.0]`; higher is simpler to build.
    pub feasibility_score: f64,
}

/// Narrative output of the funding and legal analysis stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBrief {
    pub headline: String,
    pub body: String,
    pub recommendations: Vec<String>,
}

/// Market viability profile for a `(concept, location)` pair.
///
/// Cached under a fixed TTL; a cache hit returns this value unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketProfile {
    pub concept: String,
    pub location: String,
    /// Normalized search-interest signal, `[0.0, 1.0]`.
    pub trend_score: f64,
    /// Estimated competitor count in the segment.
    pub competitor_count: u32,
    /// Blended viability, `[0.0, 5.0]`.
    pub viability_score: f64,
    pub rationale: String,
}

/// Qualitative readiness bucket for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessLevel {
    Excellent,
    Good,
    Moderate,
    NeedsWork,
}

impl ReadinessLevel {
    /// Map an overall dimensional score to a readiness level.
    pub fn from_overall(overall: f64) -> Self {
        if overall >= 0.8 {
            ReadinessLevel::Excellent
        } else if overall >= 0.6 {
            ReadinessLevel::Good
        } else if overall >= 0.4 {
            ReadinessLevel::Moderate
        } else {
            ReadinessLevel::NeedsWork
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ReadinessLevel::Excellent => "Excellent! Strong foundation for a startup",
            ReadinessLevel::Good => "Good potential with some refinements needed",
            ReadinessLevel::Moderate => "Moderate potential - focus on key improvements",
            ReadinessLevel::NeedsWork => "Needs significant development before pursuing",
        }
    }
}

/// Aggregated readiness report, the final pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub title: String,
    pub domains: Vec<String>,
    /// Overall dimensional score, `[0.0, 1.0]`.
    pub overall_score: f64,
    /// Feasibility from the validate stage, `[0.0, 5.0]`.
    pub feasibility_score: f64,
    pub readiness: ReadinessLevel,
    pub summary: String,
}

/// Output of a single pipeline stage, tagged by stage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StageOutput {
    Crystallized(IdeaStructure),
    Validated(RefinedConcept),
    Dimensions(DimensionalScore),
    TeamBuilding(Vec<MatchResult>),
    Funding(AnalysisBrief),
    Legal(AnalysisBrief),
    Market(MarketProfile),
    FinalReport(ReadinessReport),
}

impl StageOutput {
    /// The stage this output belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            StageOutput::Crystallized(_) => Stage::Crystallize,
            StageOutput::Validated(_) => Stage::Validate,
            StageOutput::Dimensions(_) => Stage::DimensionalAnalysis,
            StageOutput::TeamBuilding(_) => Stage::TeamBuilding,
            StageOutput::Funding(_) => Stage::FundingAnalysis,
            StageOutput::Legal(_) => Stage::LegalCompliance,
            StageOutput::Market(_) => Stage::MarketAnalysis,
            StageOutput::FinalReport(_) => Stage::FinalReport,
        }
    }
}

/// Result of executing one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub output: StageOutput,
    /// True when the heuristic fallback produced this output.
    pub used_fallback: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// One execution of the full pipeline for a single idea submission.
///
/// Mutated only by the orchestrator; immutable once `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: RunId,
    pub conversation_id: ConversationId,
    pub team_id: TeamId,
    pub status: RunStatus,
    /// Stage results in execution order.
    pub stage_results: Vec<StageResult>,
    /// True if any stage used its fallback path.
    pub degraded: bool,
    /// Stages that used the fallback path, in execution order.
    pub degraded_stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WorkflowRun {
    /// Create a new pending run for a submission.
    pub fn new(conversation_id: ConversationId, team_id: TeamId) -> Self {
        Self {
            run_id: RunId::generate(),
            conversation_id,
            team_id,
            status: RunStatus::Pending,
            stage_results: Vec::new(),
            degraded: false,
            degraded_stages: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Record a completed stage, updating the degradation flags.
    pub fn record_stage(&mut self, result: StageResult) {
        if result.used_fallback {
            self.degraded = true;
            if !self.degraded_stages.contains(&result.stage) {
                self.degraded_stages.push(result.stage);
            }
        }
        self.stage_results.push(result);
    }

    /// Find the result for a given stage, if it ran.
    pub fn stage_result(&self, stage: Stage) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Mark the run as started.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the run as completed.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the run as failed, keeping all stage results gathered so far.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Whether the run reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Aggregated result returned to a caller once a run is terminal.
///
/// A failed run still carries every stage result computed before the
/// failure; callers always receive partial output, never an empty error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: RunId,
    pub conversation_id: ConversationId,
    pub status: RunStatus,
    pub degraded: bool,
    pub degraded_stages: Vec<Stage>,
    pub stage_results: Vec<StageResult>,
    pub report: Option<ReadinessReport>,
    pub error: Option<String>,
}

impl From<WorkflowRun> for WorkflowResult {
    fn from(run: WorkflowRun) -> Self {
        let report = run.stage_results.iter().find_map(|r| match &r.output {
            StageOutput::FinalReport(report) => Some(report.clone()),
            _ => None,
        });
        Self {
            run_id: run.run_id,
            conversation_id: run.conversation_id,
            status: run.status,
            degraded: run.degraded,
            degraded_stages: run.degraded_stages,
            stage_results: run.stage_results,
            report,
            error: run.error,
        }
    }
}
