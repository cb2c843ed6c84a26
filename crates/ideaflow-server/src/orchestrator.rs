//! The workflow orchestrator: sequences the stage library over one run.
//!
//! Stages execute strictly in the fixed pipeline order. A stage attempt
//! that fails retryably is retried with bounded exponential backoff (max 3
//! attempts); an unavailable backend skips straight to the stage's
//! deterministic fallback. A run only fails when a fallback itself fails,
//! and even then every previously computed stage result is retained.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ideaflow_core::{
    ConversationId, ProgressEvent, RunId, StageResult, TeamId, WorkflowResult, WorkflowRun,
};
use ideaflow_model_sdk::ModelInvoker;

use crate::broadcast::ProgressBroadcaster;
use crate::matching::MatchingEngine;
use crate::memory::ConversationStore;
use crate::stages::{
    CrystallizeStage, DimensionsStage, FundingStage, LegalStage, MarketCache, MarketStage,
    PipelineStage, ReportStage, StageContext, TeamStage, ValidateStage,
};

/// Minimum idea length accepted for orchestration.
pub const MIN_IDEA_LEN: usize = 10;

/// Orchestrator errors surfaced to callers.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Input rejected before orchestration started.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The run task ended without producing a result (panic or shutdown).
    #[error("Run aborted: {0}")]
    Aborted(String),
}

/// Handle to an in-flight run.
///
/// A newer run for the same conversation supersedes older ones by run-id
/// comparison on the consumer side; late results from a superseded run are
/// discarded by the consumer, never merged here.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    pub conversation_id: ConversationId,
    task: JoinHandle<WorkflowResult>,
}

impl RunHandle {
    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<WorkflowResult, OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::Aborted(e.to_string()))
    }
}

/// The orchestrator. Cheap to clone via `Arc`; independent runs execute
/// fully concurrently, sharing only the memory store and market cache.
pub struct Orchestrator {
    invoker: Option<Arc<dyn ModelInvoker>>,
    store: Arc<ConversationStore>,
    broadcaster: Arc<ProgressBroadcaster>,
    engine: Arc<MatchingEngine>,
    market_cache: Arc<MarketCache>,
    max_attempts: u32,
    backoff: Duration,
    team_top_k: usize,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoker: Option<Arc<dyn ModelInvoker>>,
        store: Arc<ConversationStore>,
        broadcaster: Arc<ProgressBroadcaster>,
        engine: Arc<MatchingEngine>,
        market_cache: Arc<MarketCache>,
        max_attempts: u32,
        backoff: Duration,
        team_top_k: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            invoker,
            store,
            broadcaster,
            engine,
            market_cache,
            max_attempts: max_attempts.max(1),
            backoff,
            team_top_k,
        })
    }

    /// Validate a submission and start a run for it.
    ///
    /// The run executes in a background task; the returned handle can be
    /// awaited for the aggregated result while progress streams to the
    /// conversation and team channels.
    pub fn start(
        self: Arc<Self>,
        raw_idea: &str,
        conversation_id: ConversationId,
        team_id: TeamId,
    ) -> Result<RunHandle, OrchestratorError> {
        let raw_idea = raw_idea.trim().to_string();
        if raw_idea.len() < MIN_IDEA_LEN {
            return Err(OrchestratorError::Validation(format!(
                "idea description must be at least {} characters",
                MIN_IDEA_LEN
            )));
        }

        let run = WorkflowRun::new(conversation_id.clone(), team_id);
        let run_id = run.run_id.clone();
        info!(run_id = %run_id, conversation_id = %conversation_id, "Run accepted");

        let task = tokio::spawn(async move { self.run_pipeline(run, raw_idea).await });

        Ok(RunHandle {
            run_id,
            conversation_id,
            task,
        })
    }

    /// Build a fresh stage pipeline in the fixed execution order.
    fn build_pipeline(&self) -> Vec<Box<dyn PipelineStage>> {
        let model_configured = self.invoker.is_some();
        vec![
            Box::new(CrystallizeStage::new(self.invoker.clone())),
            Box::new(ValidateStage::new(self.invoker.clone())),
            Box::new(DimensionsStage::new(self.invoker.clone())),
            Box::new(TeamStage::new(
                Arc::clone(&self.engine),
                self.team_top_k,
                model_configured,
            )),
            Box::new(FundingStage::new(self.invoker.clone())),
            Box::new(LegalStage::new(self.invoker.clone())),
            Box::new(MarketStage::new(Arc::clone(&self.market_cache))),
            Box::new(ReportStage::new(self.invoker.clone())),
        ]
    }

    async fn run_pipeline(&self, mut run: WorkflowRun, raw_idea: String) -> WorkflowResult {
        let conversation_id = run.conversation_id.clone();
        let team_id = run.team_id.clone();
        let run_id = run.run_id.clone();

        run.start();
        self.publish(
            &conversation_id,
            &team_id,
            ProgressEvent::run_started(run_id.clone(), &preview(&raw_idea)),
        )
        .await;

        let prior_context = self.store.prior_context(&conversation_id).await;
        let mut ctx = StageContext::new(raw_idea, prior_context);

        for stage_impl in self.build_pipeline() {
            let stage = stage_impl.stage();
            self.publish(
                &conversation_id,
                &team_id,
                ProgressEvent::stage_started(run_id.clone(), stage),
            )
            .await;

            let started_at = chrono::Utc::now();
            let outcome = self
                .execute_with_recovery(stage_impl.as_ref(), &ctx, &run_id, &conversation_id, &team_id)
                .await;

            let (output, used_fallback, stage_error) = match outcome {
                Ok(triple) => triple,
                Err(fatal) => {
                    error!(run_id = %run_id, stage = %stage, error = %fatal, "Stage fallback failed, run fails");
                    run.fail(format!("stage {} failed: {}", stage, fatal));
                    self.publish(
                        &conversation_id,
                        &team_id,
                        ProgressEvent::run_failed(run_id.clone(), &fatal, run.stage_results.len()),
                    )
                    .await;
                    self.broadcaster.retire_conversation(&conversation_id);
                    return WorkflowResult::from(run);
                }
            };

            ctx.absorb(&output);
            let result = StageResult {
                stage,
                output,
                used_fallback,
                started_at,
                completed_at: chrono::Utc::now(),
                error: stage_error,
            };
            self.store.append(&conversation_id, &run_id, &result).await;
            run.record_stage(result);

            self.publish(
                &conversation_id,
                &team_id,
                ProgressEvent::stage_completed(run_id.clone(), stage, used_fallback),
            )
            .await;
        }

        run.complete();
        info!(
            run_id = %run_id,
            degraded = run.degraded,
            degraded_stages = ?run.degraded_stages,
            "Run completed"
        );
        self.publish(
            &conversation_id,
            &team_id,
            ProgressEvent::run_completed(run_id.clone(), run.degraded, &run.degraded_stages),
        )
        .await;
        self.broadcaster.retire_conversation(&conversation_id);

        WorkflowResult::from(run)
    }

    /// Run one stage with retry, then fallback.
    ///
    /// Returns `(output, used_fallback, absorbed_error)` on any recoverable
    /// path; the outer `Err` means even the fallback failed.
    async fn execute_with_recovery(
        &self,
        stage_impl: &dyn PipelineStage,
        ctx: &StageContext,
        run_id: &RunId,
        conversation_id: &ConversationId,
        team_id: &TeamId,
    ) -> Result<(ideaflow_core::StageOutput, bool, Option<String>), String> {
        let stage = stage_impl.stage();
        let mut attempt = 0u32;

        let last_error = loop {
            attempt += 1;
            match stage_impl.execute(ctx).await {
                Ok(execution) => {
                    return Ok((execution.output, execution.degraded, None));
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(run_id = %run_id, stage = %stage, attempt, error = %e, "Stage attempt failed, retrying");
                    self.publish(
                        conversation_id,
                        team_id,
                        ProgressEvent::stage_error(run_id.clone(), stage, &e.to_string()),
                    )
                    .await;
                    tokio::time::sleep(self.backoff * 2u32.saturating_pow(attempt - 1)).await;
                }
                Err(e) => break e,
            }
        };

        // Stage errors are informational; the run may still recover.
        warn!(run_id = %run_id, stage = %stage, error = %last_error, "Falling back to heuristic path");
        self.publish(
            conversation_id,
            team_id,
            ProgressEvent::stage_error(run_id.clone(), stage, &last_error.to_string()),
        )
        .await;

        match stage_impl.fallback(ctx).await {
            Ok(output) => Ok((output, true, Some(last_error.to_string()))),
            Err(fallback_error) => Err(fallback_error.to_string()),
        }
    }

    async fn publish(
        &self,
        conversation_id: &ConversationId,
        team_id: &TeamId,
        event: ProgressEvent,
    ) {
        self.broadcaster.publish(conversation_id, team_id, event).await;
    }
}

fn preview(idea: &str) -> String {
    idea.chars().take(100).collect()
}
