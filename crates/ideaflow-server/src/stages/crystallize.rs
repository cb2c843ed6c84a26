//! Crystallize: raw idea text into a structured blueprint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use ideaflow_core::{IdeaStructure, SearchQueries, Stage, StageOutput};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

use super::{sentence_title, PipelineStage, StageContext, StageError, StageExecution};

const SYSTEM_PROMPT: &str = "You are a startup analyst. Crystallize the raw idea into a \
structured blueprint that powers developer matching and event discovery. Choose a broad \
core_domain, a specific target_vertical, at most five technologies, the compliance needs \
the domain implies, and the critical co-founder roles still missing. Return ONLY JSON.";

const SHAPE: &str = r#"{
  "refined_title": "<professional concept name>",
  "core_domain": "<broad industry category>",
  "target_vertical": "<specific niche>",
  "tech_stack": ["<technology>", ...],
  "regulatory_needs": ["<requirement>", ...],
  "co_founder_roles": ["<role>", ...],
  "search_queries": { "repository": "<query>", "events": "<query>" }
}"#;

#[derive(Debug, Deserialize)]
struct RawStructure {
    refined_title: String,
    core_domain: String,
    #[serde(default)]
    target_vertical: String,
    #[serde(default)]
    tech_stack: Vec<String>,
    #[serde(default)]
    regulatory_needs: Vec<String>,
    #[serde(default)]
    co_founder_roles: Vec<String>,
    #[serde(default)]
    search_queries: Option<RawQueries>,
}

#[derive(Debug, Deserialize)]
struct RawQueries {
    #[serde(default)]
    repository: String,
    #[serde(default)]
    events: String,
}

/// The crystallize stage.
pub struct CrystallizeStage {
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl CrystallizeStage {
    pub fn new(invoker: Option<Arc<dyn ModelInvoker>>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl PipelineStage for CrystallizeStage {
    fn stage(&self) -> Stage {
        Stage::Crystallize
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or(AdapterError::NotConfigured("no model backend".to_string()))?;

        let mut user = format!("Startup idea:\n{}\n", ctx.raw_idea);
        if let Some(context) = &ctx.prior_context {
            user.push_str("\n");
            user.push_str(context);
            user.push('\n');
        }
        let prompt = PromptTemplate::new(SYSTEM_PROMPT, user).with_shape_hint(SHAPE);

        let raw: RawStructure = invoke_json(invoker.as_ref(), &prompt).await?;
        let mut structure = normalize(raw);
        if structure.search_queries.repository.is_empty() {
            structure.search_queries = derive_queries(&structure);
        }
        Ok(StageExecution::clean(StageOutput::Crystallized(structure)))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Crystallized(heuristic_structure(&ctx.raw_idea)))
    }
}

fn normalize(raw: RawStructure) -> IdeaStructure {
    let mut tech_stack = raw.tech_stack;
    tech_stack.truncate(5);
    IdeaStructure {
        refined_title: raw.refined_title.chars().take(120).collect(),
        core_domain: if raw.core_domain.is_empty() {
            "Technology".to_string()
        } else {
            raw.core_domain
        },
        target_vertical: raw.target_vertical,
        tech_stack,
        regulatory_needs: raw.regulatory_needs,
        co_founder_roles: raw.co_founder_roles,
        search_queries: raw
            .search_queries
            .map(|q| SearchQueries {
                repository: q.repository,
                events: q.events,
            })
            .unwrap_or_default(),
    }
}

/// Keyword-driven blueprint used when the backend is unreachable.
pub(crate) fn heuristic_structure(raw_text: &str) -> IdeaStructure {
    let text = raw_text.to_lowercase();

    let (core_domain, target_vertical) = if ["health", "medical", "clinic", "patient", "doctor"]
        .iter()
        .any(|k| text.contains(k))
    {
        ("Healthcare", if text.contains("clinic") { "Clinical Operations" } else { "Digital Health" })
    } else if ["finance", "bank", "payment", "invoice", "money", "trading"]
        .iter()
        .any(|k| text.contains(k))
    {
        ("Finance", "Fintech Platform")
    } else if ["educat", "learn", "student", "school", "course"]
        .iter()
        .any(|k| text.contains(k))
    {
        ("Education", "Online Learning")
    } else if ["shop", "ecommerce", "retail", "store", "marketplace"]
        .iter()
        .any(|k| text.contains(k))
    {
        ("Retail", "E-commerce Platform")
    } else {
        ("Technology", "Software Platform")
    };

    let mut tech_stack: Vec<String> = [
        ("python", "Python"),
        ("javascript", "JavaScript"),
        ("react", "React"),
        ("rust", "Rust"),
        ("mobile", "React Native"),
        ("ai", "Machine Learning"),
        ("blockchain", "Blockchain"),
    ]
    .iter()
    .filter(|(k, _)| text.contains(k))
    .map(|(_, v)| v.to_string())
    .collect();
    if tech_stack.is_empty() {
        tech_stack = vec!["Python".to_string(), "React".to_string()];
    }
    tech_stack.truncate(5);

    let regulatory_needs: Vec<String> = match core_domain {
        "Healthcare" => vec!["HIPAA Compliance".to_string(), "Data Privacy".to_string()],
        "Finance" => vec!["PCI-DSS".to_string(), "KYC/AML".to_string()],
        _ if text.contains("gdpr") || text.contains("europe") => vec!["GDPR".to_string()],
        _ => Vec::new(),
    };

    let co_founder_roles = match core_domain {
        "Healthcare" => vec!["Clinical Advisor".to_string(), "ML Engineer".to_string()],
        "Finance" => vec!["Fintech Domain Expert".to_string(), "Security Engineer".to_string()],
        "Education" => vec!["Curriculum Designer".to_string(), "Full-Stack Developer".to_string()],
        "Retail" => vec!["E-commerce Strategist".to_string(), "UX Designer".to_string()],
        _ => vec!["Technical Co-founder".to_string(), "Growth Lead".to_string()],
    };

    let mut structure = IdeaStructure {
        refined_title: sentence_title(raw_text, 100),
        core_domain: core_domain.to_string(),
        target_vertical: target_vertical.to_string(),
        tech_stack,
        regulatory_needs,
        co_founder_roles,
        search_queries: SearchQueries::default(),
    };
    structure.search_queries = derive_queries(&structure);
    structure
}

/// Derive search queries from a partial structure.
fn derive_queries(structure: &IdeaStructure) -> SearchQueries {
    const LANGUAGES: [&str; 8] = [
        "python", "javascript", "typescript", "java", "go", "rust", "ruby", "swift",
    ];

    let mut repo_parts = Vec::new();
    if let Some(lang) = structure
        .tech_stack
        .iter()
        .find(|t| LANGUAGES.contains(&t.to_lowercase().as_str()))
    {
        repo_parts.push(format!("language:{}", lang.to_lowercase()));
    }
    let topic = match structure.core_domain.to_lowercase().as_str() {
        "healthcare" => "healthcare-ai".to_string(),
        "finance" => "fintech".to_string(),
        "education" => "edtech".to_string(),
        "retail" => "e-commerce".to_string(),
        other => other.replace(' ', "-"),
    };
    repo_parts.push(format!("topic:{}", topic));

    let events = if structure.target_vertical.is_empty() {
        format!("{} Conference", structure.core_domain)
    } else {
        format!("{} {} Summit", structure.target_vertical, structure.core_domain)
    };

    SearchQueries {
        repository: repo_parts.join(" "),
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_detects_finance() {
        let structure =
            heuristic_structure("A mobile app for freelancers to track time and generate invoices");
        assert_eq!(structure.core_domain, "Finance");
        assert!(structure.regulatory_needs.contains(&"PCI-DSS".to_string()));
        assert!(!structure.refined_title.is_empty());
        assert!(structure.search_queries.repository.contains("topic:fintech"));
    }

    #[test]
    fn test_heuristic_default_domain() {
        let structure = heuristic_structure("a club for trading gardening tips");
        assert_eq!(structure.core_domain, "Finance"); // "trading" keyword
        let structure = heuristic_structure("a club for sharing gardening tips");
        assert_eq!(structure.core_domain, "Technology");
        assert_eq!(structure.tech_stack, vec!["Python", "React"]);
    }

    #[test]
    fn test_tech_stack_capped_at_five() {
        let structure = heuristic_structure(
            "python javascript react rust mobile ai blockchain everything",
        );
        assert!(structure.tech_stack.len() <= 5);
    }

    #[tokio::test]
    async fn test_execute_without_invoker_is_unavailable() {
        let stage = CrystallizeStage::new(None);
        let ctx = StageContext::new("some idea", None);
        let err = stage.execute(&ctx).await.unwrap_err();
        assert!(!err.is_retryable());
        match err {
            StageError::Upstream(e) => assert!(e.is_unavailable()),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
