//! Conversation memory store.
//!
//! Keyed, append-only persistence of stage history per conversation id.
//! Concurrent readers are cheap; writes to distinct keys never contend on
//! anything but the outer map lock, and same-key writes are last-write-wins
//! (in practice a key is written by one logical run at a time).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use ideaflow_core::{ConversationId, RunId, Stage, StageOutput, StageResult};

/// One persisted stage record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub run_id: RunId,
    pub stage: Stage,
    /// Snapshot of the stage output at completion time.
    pub output: StageOutput,
    pub used_fallback: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only store of stage history per conversation.
///
/// History is capped per conversation; the oldest records are dropped once
/// the cap is reached. Retention is otherwise indefinite for the process
/// lifetime.
pub struct ConversationStore {
    records: RwLock<HashMap<ConversationId, Vec<StageRecord>>>,
    cap: usize,
}

impl ConversationStore {
    /// Create a store with the given per-conversation record cap.
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(HashMap::new()),
            cap: cap.max(1),
        })
    }

    /// Append a stage result for a conversation.
    pub async fn append(&self, conversation_id: &ConversationId, run_id: &RunId, result: &StageResult) {
        let record = StageRecord {
            run_id: run_id.clone(),
            stage: result.stage,
            output: result.output.clone(),
            used_fallback: result.used_fallback,
            recorded_at: result.completed_at,
        };

        let mut records = self.records.write().await;
        let history = records.entry(conversation_id.clone()).or_default();
        history.push(record);
        if history.len() > self.cap {
            let overflow = history.len() - self.cap;
            history.drain(..overflow);
        }
    }

    /// Full ordered history for a conversation, empty if none.
    pub async fn history(&self, conversation_id: &ConversationId) -> Vec<StageRecord> {
        self.records
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Compact textual context from prior runs, fed to a new run's prompts.
    ///
    /// Summarizes the most recent records so a resubmitted idea benefits
    /// from earlier analysis without replaying it.
    pub async fn prior_context(&self, conversation_id: &ConversationId) -> Option<String> {
        let records = self.records.read().await;
        let history = records.get(conversation_id)?;
        if history.is_empty() {
            return None;
        }

        let mut lines = Vec::new();
        for record in history.iter().rev().take(8).rev() {
            let note = match &record.output {
                StageOutput::Validated(concept) => {
                    format!("validated as \"{}\" ({})", concept.idea_title, concept.core_domain)
                }
                StageOutput::Dimensions(score) => {
                    format!("overall dimensional score {:.2}", score.overall_score())
                }
                StageOutput::FinalReport(report) => {
                    format!("previous readiness: {:?}", report.readiness)
                }
                other => format!("{} completed", other.stage()),
            };
            lines.push(format!("- {}", note));
        }
        Some(format!("Prior analysis in this conversation:\n{}", lines.join("\n")))
    }

    /// Number of conversations with recorded history.
    pub async fn conversation_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::{AnalysisBrief, RefinedConcept};

    fn result_for(stage: Stage, output: StageOutput) -> StageResult {
        let now = Utc::now();
        StageResult {
            stage,
            output,
            used_fallback: false,
            started_at: now,
            completed_at: now,
            error: None,
        }
    }

    fn funding_output(n: usize) -> StageOutput {
        StageOutput::Funding(AnalysisBrief {
            headline: format!("brief {}", n),
            body: String::new(),
            recommendations: vec![],
        })
    }

    #[tokio::test]
    async fn test_append_and_history_order() {
        let store = ConversationStore::new(16);
        let conv = ConversationId::new("conv-1");
        let run = RunId::generate();

        for n in 0..3 {
            store
                .append(&conv, &run, &result_for(Stage::FundingAnalysis, funding_output(n)))
                .await;
        }

        let history = store.history(&conv).await;
        assert_eq!(history.len(), 3);
        match &history[0].output {
            StageOutput::Funding(brief) => assert_eq!(brief.headline, "brief 0"),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cap_drops_oldest() {
        let store = ConversationStore::new(2);
        let conv = ConversationId::new("conv-1");
        let run = RunId::generate();

        for n in 0..5 {
            store
                .append(&conv, &run, &result_for(Stage::FundingAnalysis, funding_output(n)))
                .await;
        }

        let history = store.history(&conv).await;
        assert_eq!(history.len(), 2);
        match &history[0].output {
            StageOutput::Funding(brief) => assert_eq!(brief.headline, "brief 3"),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prior_context_summarizes() {
        let store = ConversationStore::new(16);
        let conv = ConversationId::new("conv-1");
        let run = RunId::generate();

        assert!(store.prior_context(&conv).await.is_none());

        let concept = RefinedConcept {
            idea_title: "Invoicer".into(),
            problem_statement: "p".into(),
            solution_concept: "s".into(),
            target_user: "freelancers".into(),
            core_domain: "SaaS".into(),
            suggested_location: None,
            suggestions: vec![],
            feasibility_score: 4.0,
        };
        store
            .append(&conv, &run, &result_for(Stage::Validate, StageOutput::Validated(concept)))
            .await;

        let context = store.prior_context(&conv).await.unwrap();
        assert!(context.contains("Invoicer"));
        assert!(context.contains("SaaS"));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_mix() {
        let store = ConversationStore::new(16);
        let run = RunId::generate();
        store
            .append(
                &ConversationId::new("a"),
                &run,
                &result_for(Stage::FundingAnalysis, funding_output(0)),
            )
            .await;

        assert!(store.history(&ConversationId::new("b")).await.is_empty());
        assert_eq!(store.conversation_count().await, 1);
    }
}
