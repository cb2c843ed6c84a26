//! Progress events emitted while a run moves through the pipeline.

use crate::ids::{EventId, RunId};
use crate::status::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Type of progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    /// The run began executing.
    RunStarted,
    /// A stage began executing.
    StageStarted,
    /// A stage finished (possibly via fallback).
    StageCompleted,
    /// A stage attempt errored (the run may still recover).
    StageError,
    /// The run completed; payload carries the aggregated result summary.
    RunCompleted,
    /// The run failed; partial results remain retrievable.
    RunFailed,
}

/// A progress event delivered to live subscribers.
///
/// Delivery is at-most-once and fire-and-forget; reconnecting clients fetch
/// a history snapshot instead of relying on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: EventId,
    pub run_id: RunId,
    /// The stage involved, absent for run-level events.
    pub stage: Option<Stage>,
    pub event_type: ProgressEventType,
    pub timestamp: DateTime<Utc>,
    /// Event-specific payload (stage summaries, errors, degradation flags).
    pub payload: Value,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(
        run_id: RunId,
        stage: Option<Stage>,
        event_type: ProgressEventType,
        payload: Value,
    ) -> Self {
        Self {
            id: EventId::generate(),
            run_id,
            stage,
            event_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Create a RunStarted event.
    pub fn run_started(run_id: RunId, idea_preview: &str) -> Self {
        Self::new(
            run_id,
            None,
            ProgressEventType::RunStarted,
            json!({ "idea": idea_preview }),
        )
    }

    /// Create a StageStarted event.
    pub fn stage_started(run_id: RunId, stage: Stage) -> Self {
        Self::new(run_id, Some(stage), ProgressEventType::StageStarted, Value::Null)
    }

    /// Create a StageCompleted event.
    pub fn stage_completed(run_id: RunId, stage: Stage, used_fallback: bool) -> Self {
        Self::new(
            run_id,
            Some(stage),
            ProgressEventType::StageCompleted,
            json!({ "used_fallback": used_fallback }),
        )
    }

    /// Create a StageError event.
    pub fn stage_error(run_id: RunId, stage: Stage, error: &str) -> Self {
        Self::new(
            run_id,
            Some(stage),
            ProgressEventType::StageError,
            json!({ "error": error }),
        )
    }

    /// Create a RunCompleted event.
    pub fn run_completed(run_id: RunId, degraded: bool, degraded_stages: &[Stage]) -> Self {
        Self::new(
            run_id,
            None,
            ProgressEventType::RunCompleted,
            json!({
                "degraded": degraded,
                "degraded_stages": degraded_stages,
            }),
        )
    }

    /// Create a RunFailed event.
    pub fn run_failed(run_id: RunId, error: &str, completed_stages: usize) -> Self {
        Self::new(
            run_id,
            None,
            ProgressEventType::RunFailed,
            json!({
                "error": error,
                "completed_stages": completed_stages,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_completed_payload() {
        let run_id = RunId::generate();
        let event = ProgressEvent::stage_completed(run_id.clone(), Stage::Validate, true);

        assert_eq!(event.run_id, run_id);
        assert_eq!(event.stage, Some(Stage::Validate));
        assert_eq!(event.event_type, ProgressEventType::StageCompleted);
        assert_eq!(event.payload["used_fallback"], json!(true));
    }

    #[test]
    fn test_run_completed_lists_degraded_stages() {
        let event = ProgressEvent::run_completed(
            RunId::generate(),
            true,
            &[Stage::Crystallize, Stage::MarketAnalysis],
        );
        assert_eq!(event.payload["degraded"], json!(true));
        assert_eq!(
            event.payload["degraded_stages"],
            json!(["crystallize", "market_analysis"])
        );
    }

    #[test]
    fn test_events_get_unique_ids() {
        let run_id = RunId::generate();
        let a = ProgressEvent::stage_started(run_id.clone(), Stage::Crystallize);
        let b = ProgressEvent::stage_started(run_id, Stage::Crystallize);
        assert_ne!(a.id, b.id);
    }
}
