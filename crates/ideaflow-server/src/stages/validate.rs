//! Validate: refine the idea into an investor-ready concept profile.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use ideaflow_core::{RefinedConcept, Stage, StageOutput};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

use super::{sentence_title, PipelineStage, StageContext, StageError, StageExecution};

/// The fixed domain vocabulary of the concept profile.
const ALLOWED_DOMAINS: [&str; 7] = [
    "Fintech", "HealthTech", "EdTech", "SaaS", "E-commerce", "ClimateTech", "Other",
];

const SYSTEM_PROMPT: &str = "You are a senior VC analyst and product strategist. Transform \
the raw founder idea into a crisp, investor-ready concept profile. Articulate the pain with \
empathy and urgency; explain the solution mechanism, not just the outcome; make the target \
user more specific than the input. Feasibility: 5.0 means a simple CRUD app, 3.0 a standard \
SaaS with off-the-shelf ML, 1.0 deep tech needing research or regulatory approval. \
Return ONLY the JSON object, no markdown fences, no commentary.";

const SHAPE: &str = r#"{
  "idea_title": "<max 120 chars>",
  "problem_statement": "<200-800 chars>",
  "solution_concept": "<300-1000 chars>",
  "target_user": "<specific niche, 50-200 chars>",
  "core_domain": "Fintech" | "HealthTech" | "EdTech" | "SaaS" | "E-commerce" | "ClimateTech" | "Other",
  "suggested_location": "<market or null>",
  "nlp_suggestions": ["<2-4 actionable suggestions>"],
  "initial_feasibility_score": <float 0-5>
}"#;

#[derive(Debug, Deserialize)]
struct RawConcept {
    idea_title: String,
    problem_statement: String,
    solution_concept: String,
    target_user: String,
    core_domain: String,
    #[serde(default)]
    suggested_location: Option<String>,
    #[serde(default)]
    nlp_suggestions: Vec<String>,
    #[serde(default)]
    initial_feasibility_score: Option<f64>,
}

/// The validate stage.
pub struct ValidateStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl ValidateStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for ValidateStage {
    fn stage(&self) -> Stage {
        Stage::Validate
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        let mut user = format!("User idea:\n{}\n", ctx.raw_idea);
        if let Some(structure) = &ctx.structure {
            user.push_str(&format!(
                "\nCrystallized blueprint: {} ({} / {})\n",
                structure.refined_title, structure.core_domain, structure.target_vertical
            ));
        }
        user.push_str("\nProvide ONLY the JSON object, no other text.");
        let prompt = PromptTemplate::new(SYSTEM_PROMPT, user)
            .with_shape_hint(SHAPE)
            .with_temperature(0.0);

        let raw: RawConcept = invoke_json(invoker.as_ref(), &prompt).await?;
        Ok(StageExecution::clean(StageOutput::Validated(normalize(raw))))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Validated(heuristic_concept(&ctx.raw_idea)))
    }
}

fn normalize(raw: RawConcept) -> RefinedConcept {
    // Lenient domain coercion: title-case and fall back to Other.
    let candidate = raw.core_domain.trim();
    let core_domain = ALLOWED_DOMAINS
        .iter()
        .find(|d| d.eq_ignore_ascii_case(candidate))
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Other".to_string());

    let mut suggestions = raw.nlp_suggestions;
    suggestions.truncate(4);

    RefinedConcept {
        idea_title: raw.idea_title.chars().take(120).collect(),
        problem_statement: raw.problem_statement,
        solution_concept: raw.solution_concept,
        target_user: raw.target_user,
        core_domain,
        suggested_location: raw.suggested_location.filter(|l| !l.trim().is_empty()),
        suggestions,
        feasibility_score: raw.initial_feasibility_score.unwrap_or(2.5).clamp(0.0, 5.0),
    }
}

/// Last-resort synthesis from the raw text, used when the backend is down.
pub(crate) fn heuristic_concept(raw_text: &str) -> RefinedConcept {
    let title = {
        let t = sentence_title(raw_text, 120);
        if t.is_empty() {
            "Refined Idea".to_string()
        } else {
            t
        }
    };

    RefinedConcept {
        idea_title: title,
        problem_statement: "Not explicitly provided; inferred from the raw description.".to_string(),
        solution_concept:
            "Draft concept derived from the provided idea; refine with concrete steps.".to_string(),
        target_user: "Early adopters interested in this space.".to_string(),
        core_domain: "Other".to_string(),
        suggested_location: None,
        suggestions: vec![
            "Include lines like 'Problem:', 'Solution:' and 'User:' for sharper parsing."
                .to_string(),
            "Specify a domain (e.g. Fintech, HealthTech, SaaS) and location if relevant."
                .to_string(),
        ],
        feasibility_score: 2.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawConcept {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_coerces_domain() {
        let concept = normalize(raw(json!({
            "idea_title": "T",
            "problem_statement": "P",
            "solution_concept": "S",
            "target_user": "U",
            "core_domain": "FINTECH",
            "initial_feasibility_score": 3.5
        })));
        assert_eq!(concept.core_domain, "Fintech");

        let concept = normalize(raw(json!({
            "idea_title": "T",
            "problem_statement": "P",
            "solution_concept": "S",
            "target_user": "U",
            "core_domain": "Quantum Basket Weaving"
        })));
        assert_eq!(concept.core_domain, "Other");
        assert_eq!(concept.feasibility_score, 2.5);
    }

    #[test]
    fn test_normalize_clamps_feasibility() {
        let concept = normalize(raw(json!({
            "idea_title": "T",
            "problem_statement": "P",
            "solution_concept": "S",
            "target_user": "U",
            "core_domain": "SaaS",
            "initial_feasibility_score": 9.0
        })));
        assert_eq!(concept.feasibility_score, 5.0);
    }

    #[test]
    fn test_normalize_caps_title_length() {
        let long_title = "x".repeat(300);
        let concept = normalize(raw(json!({
            "idea_title": long_title,
            "problem_statement": "P",
            "solution_concept": "S",
            "target_user": "U",
            "core_domain": "SaaS"
        })));
        assert_eq!(concept.idea_title.chars().count(), 120);
    }

    #[test]
    fn test_heuristic_concept_has_content() {
        let concept =
            heuristic_concept("A mobile app for freelancers to track time and generate invoices");
        assert!(!concept.idea_title.is_empty());
        assert_eq!(concept.feasibility_score, 2.5);
        assert!((0.0..=5.0).contains(&concept.feasibility_score));
        assert!(concept.suggestions.len() >= 2);
    }
}
