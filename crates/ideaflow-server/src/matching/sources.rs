//! Profile sources feeding the matching engine.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use ideaflow_core::{CandidateId, CandidateProfile, ProfileKind};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

/// Structured requirements extracted from an idea's text.
#[derive(Debug, Clone, PartialEq)]
pub struct IdeaRequirements {
    /// Primary domain, title-cased (`Other` when nothing matches).
    pub domain: String,
    /// Skills mentioned in or implied by the idea text, lowercase.
    pub required_skills: Vec<String>,
}

/// Keyword-based extraction of domain and required skills.
///
/// Deliberately cheap and deterministic; the model never gates this path.
pub fn parse_idea_requirements(idea_text: &str) -> IdeaRequirements {
    const KNOWN_SKILLS: [&str; 14] = [
        "python", "javascript", "typescript", "rust", "react", "node.js", "fastapi", "aws",
        "docker", "ai", "ml", "marketing", "sales", "ui/ux",
    ];
    const KNOWN_DOMAINS: [&str; 6] = [
        "fintech", "healthtech", "edtech", "saas", "e-commerce", "climatetech",
    ];

    let text = idea_text.to_lowercase();
    let required_skills: Vec<String> = KNOWN_SKILLS
        .iter()
        .filter(|s| text.contains(*s))
        .map(|s| s.to_string())
        .collect();

    let domain = KNOWN_DOMAINS
        .iter()
        .find(|d| text.contains(*d))
        .map(|d| title_case(d))
        .unwrap_or_else(|| "Other".to_string());

    IdeaRequirements {
        domain,
        required_skills,
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Profile source failures. A failed source contributes zero profiles; it
/// never aborts the overall match request.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Request(String),

    #[error("source timed out")]
    Timeout,
}

/// A source of candidate profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Stable source name, for logs.
    fn name(&self) -> &'static str;

    /// Fetch profiles relevant to the given requirements.
    async fn fetch(&self, requirements: &IdeaRequirements)
        -> Result<Vec<CandidateProfile>, SourceError>;
}

// ============================================================================
// Internal directory
// ============================================================================

/// The internal member directory, seeded at startup.
pub struct DirectorySource {
    members: Vec<CandidateProfile>,
}

impl DirectorySource {
    /// Create a directory over an explicit member list.
    pub fn new(members: Vec<CandidateProfile>) -> Self {
        Self { members }
    }

    /// The built-in development seed: a small founder directory.
    pub fn seeded() -> Self {
        let founder = |id: u32, name: &str, skills: &[&str], interests: &[&str], location: &str, bio: &str| {
            CandidateProfile {
                id: CandidateId::new(id.to_string()),
                name: name.to_string(),
                source: ProfileKind::InternalDirectory,
                skills: skills.iter().map(|s| s.to_string()).collect(),
                location: Some(location.to_string()),
                bio: Some(bio.to_string()),
                contact_channels: vec![format!("directory:{}", id)],
                interests: interests.iter().map(|s| s.to_string()).collect(),
            }
        };
        Self::new(vec![
            founder(1, "Alex Moreno", &["python", "fastapi", "aws"], &["saas", "ai"], "Berlin",
                "Backend engineer who has shipped three B2B SaaS products end to end."),
            founder(2, "Brenda Okafor", &["marketing", "sales"], &["fintech", "e-commerce"], "London",
                "Growth lead; built outbound funnels from zero to first hundred customers."),
            founder(3, "Chen Wei", &["rust", "ml", "docker"], &["ai", "deeptech"], "Singapore",
                "Systems and ML engineer, previously at a payments infrastructure startup."),
            founder(4, "Dana Petrova", &["ui/ux", "react", "javascript"], &["consumer", "saas"], "Lisbon",
                "Product designer turned frontend engineer; obsessive about onboarding flows."),
            founder(5, "Elias Haddad", &["python", "ai", "ml"], &["healthtech", "ai"], "Toronto",
                "Applied scientist with clinical-data experience and two shipped ML products."),
            founder(6, "Fatima Noor", &["sales", "marketing"], &["edtech", "saas"], "Dubai",
                "Partnerships and GTM operator across emerging-market education platforms."),
        ])
    }
}

#[async_trait]
impl ProfileSource for DirectorySource {
    fn name(&self) -> &'static str {
        "internal_directory"
    }

    async fn fetch(
        &self,
        _requirements: &IdeaRequirements,
    ) -> Result<Vec<CandidateProfile>, SourceError> {
        // The engine scores and filters; the directory returns everyone.
        Ok(self.members.clone())
    }
}

// ============================================================================
// External repository search
// ============================================================================

/// Developer profiles harvested from a repository-hosting search API
/// (GitHub-style REST). Disabled (empty results) when no token is set.
pub struct RepositorySource {
    http: reqwest::Client,
    base_url: String,
    token: String,
    users_limit: usize,
}

#[derive(Debug, Deserialize)]
struct UserSearchResponse {
    #[serde(default)]
    items: Vec<UserSearchItem>,
}

#[derive(Debug, Deserialize)]
struct UserSearchItem {
    id: u64,
    login: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct UserDetail {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

impl RepositorySource {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            users_limit: 5,
        }
    }

    async fn user_detail(&self, item: &UserSearchItem) -> Option<UserDetail> {
        let url = if item.url.is_empty() {
            format!("{}/users/{}", self.base_url, item.login)
        } else {
            item.url.clone()
        };
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "ideaflow")
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json().await.ok()
    }
}

#[async_trait]
impl ProfileSource for RepositorySource {
    fn name(&self) -> &'static str {
        "external_repository"
    }

    async fn fetch(
        &self,
        requirements: &IdeaRequirements,
    ) -> Result<Vec<CandidateProfile>, SourceError> {
        if self.token.is_empty() {
            warn!("Repository search token not set, skipping repository source");
            return Ok(Vec::new());
        }

        let mut query_terms = requirements.required_skills.clone();
        query_terms.push(requirements.domain.to_lowercase());
        let query = query_terms.join("+");

        let resp = self
            .http
            .get(format!("{}/search/users", self.base_url))
            .query(&[("q", query.as_str()), ("per_page", "5")])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "ideaflow")
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Request(format!(
                "search returned {}",
                resp.status()
            )));
        }

        let search: UserSearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let mut profiles = Vec::new();
        for item in search.items.iter().take(self.users_limit) {
            let detail = self.user_detail(item).await.unwrap_or(UserDetail {
                name: None,
                bio: None,
                location: None,
                html_url: None,
            });
            let bio = detail.bio.unwrap_or_default();
            // Skill hints: the query terms that show up in the bio.
            let skills: Vec<String> = query_terms
                .iter()
                .filter(|t| bio.to_lowercase().contains(*t))
                .cloned()
                .collect();
            profiles.push(CandidateProfile {
                id: CandidateId::new(item.id.to_string()),
                name: detail.name.unwrap_or_else(|| item.login.clone()),
                source: ProfileKind::ExternalRepository,
                skills,
                location: detail.location,
                bio: if bio.is_empty() { None } else { Some(bio) },
                contact_channels: detail.html_url.into_iter().collect(),
                interests: vec![requirements.domain.to_lowercase()],
            });
        }
        Ok(profiles)
    }
}

// ============================================================================
// Synthesized personas
// ============================================================================

/// Non-technical cofounder personas complementing the real profiles.
///
/// Uses the model when reachable; otherwise emits a deterministic set so
/// ranking stays stable across retries.
pub struct SynthesizedSource {
    invoker: Option<std::sync::Arc<dyn ModelInvoker>>,
    max_profiles: usize,
}

#[derive(Debug, Deserialize)]
struct PersonaPayload {
    #[serde(default)]
    profiles: Vec<Persona>,
}

#[derive(Debug, Deserialize)]
struct Persona {
    name: String,
    #[serde(default)]
    role_type: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    skills: Vec<String>,
}

const PERSONA_ROLES: [(&str, &[&str]); 4] = [
    ("Growth Strategist", &["marketing", "customer discovery", "category narrative"]),
    ("Operations Architect", &["operational scaling", "finance", "hiring"]),
    ("Partnerships Lead", &["sales", "strategic partnerships", "gtm"]),
    ("Regulatory Specialist", &["compliance", "regulatory path", "data privacy"]),
];

const PERSONA_NAMES: [&str; 4] = ["Ava Lin", "Rohan Patel", "Maya Brooks", "Elena Ruiz"];

impl SynthesizedSource {
    pub fn new(invoker: Option<std::sync::Arc<dyn ModelInvoker>>) -> Self {
        Self {
            invoker,
            max_profiles: 4,
        }
    }

    /// Deterministic personas keyed by index; no randomness so repeated
    /// calls rank identically.
    fn fallback_personas(&self, requirements: &IdeaRequirements) -> Vec<CandidateProfile> {
        PERSONA_ROLES
            .iter()
            .zip(PERSONA_NAMES.iter())
            .take(self.max_profiles)
            .enumerate()
            .map(|(i, ((role, skills), name))| CandidateProfile {
                id: CandidateId::new(format!("persona-{}", i + 1)),
                name: name.to_string(),
                source: ProfileKind::Synthesized,
                skills: skills.iter().map(|s| s.to_string()).collect(),
                location: None,
                bio: Some(format!(
                    "{} persona complementing a technical founding team in {}.",
                    role, requirements.domain
                )),
                contact_channels: Vec::new(),
                interests: vec![requirements.domain.to_lowercase()],
            })
            .collect()
    }

    async fn generated_personas(
        &self,
        invoker: &dyn ModelInvoker,
        requirements: &IdeaRequirements,
    ) -> Result<Vec<CandidateProfile>, AdapterError> {
        let prompt = PromptTemplate::new(
            "You generate senior non-technical cofounder persona candidates to complement \
             a technical founding team. Avoid generic filler; differentiate the strengths. \
             Return ONLY JSON.",
            format!(
                "Domain: {}. Required skills already covered: {}. \
                 Generate up to {} personas as {{\"profiles\": [{{\"name\", \"role_type\", \"bio\", \"skills\"}}]}}.",
                requirements.domain,
                requirements.required_skills.join(", "),
                self.max_profiles
            ),
        )
        .with_shape_hint(r#"{"profiles": [{"name": "<string>", "role_type": "<string>", "bio": "<string>", "skills": ["<string>"]}]}"#)
        .with_temperature(0.7);

        let payload: PersonaPayload = invoke_json(invoker, &prompt).await?;
        Ok(payload
            .profiles
            .into_iter()
            .take(self.max_profiles)
            .enumerate()
            .map(|(i, p)| CandidateProfile {
                id: CandidateId::new(format!("persona-{}", i + 1)),
                name: p.name,
                source: ProfileKind::Synthesized,
                skills: p.skills.iter().map(|s| s.to_lowercase()).collect(),
                location: None,
                bio: Some(if p.bio.is_empty() { p.role_type } else { p.bio }),
                contact_channels: Vec::new(),
                interests: vec![requirements.domain.to_lowercase()],
            })
            .collect())
    }
}

#[async_trait]
impl ProfileSource for SynthesizedSource {
    fn name(&self) -> &'static str {
        "synthesized"
    }

    async fn fetch(
        &self,
        requirements: &IdeaRequirements,
    ) -> Result<Vec<CandidateProfile>, SourceError> {
        if let Some(invoker) = &self.invoker {
            match self.generated_personas(invoker.as_ref(), requirements).await {
                Ok(profiles) if !profiles.is_empty() => return Ok(profiles),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Persona generation failed, using deterministic set"),
            }
        }
        Ok(self.fallback_personas(requirements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirements_extracts_domain_and_skills() {
        let req = parse_idea_requirements(
            "AI SaaS for freelancers, built with Python and React, needs marketing help",
        );
        assert_eq!(req.domain, "Saas");
        assert!(req.required_skills.contains(&"python".to_string()));
        assert!(req.required_skills.contains(&"react".to_string()));
        assert!(req.required_skills.contains(&"marketing".to_string()));
        assert!(req.required_skills.contains(&"ai".to_string()));
    }

    #[test]
    fn test_parse_requirements_defaults_to_other() {
        let req = parse_idea_requirements("a neighborhood tool-lending club");
        assert_eq!(req.domain, "Other");
        assert!(req.required_skills.is_empty());
    }

    #[tokio::test]
    async fn test_directory_returns_seed() {
        let source = DirectorySource::seeded();
        let req = parse_idea_requirements("fintech app");
        let profiles = source.fetch(&req).await.unwrap();
        assert_eq!(profiles.len(), 6);
        assert!(profiles.iter().all(|p| p.source == ProfileKind::InternalDirectory));
    }

    #[tokio::test]
    async fn test_repository_source_without_token_is_empty() {
        let source = RepositorySource::new("https://api.example.com", "");
        let req = parse_idea_requirements("fintech app");
        assert!(source.fetch(&req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synthesized_fallback_is_deterministic() {
        let source = SynthesizedSource::new(None);
        let req = parse_idea_requirements("healthtech platform");
        let first = source.fetch(&req).await.unwrap();
        let second = source.fetch(&req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|p| p.source == ProfileKind::Synthesized));
    }
}
