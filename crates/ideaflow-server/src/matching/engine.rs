//! The matching engine: aggregate, dedup, score, rank.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use ideaflow_core::{CandidateId, CandidateProfile, MatchResult};
use ideaflow_model_sdk::{invoke_json, ModelInvoker, PromptTemplate};

use super::sources::{parse_idea_requirements, IdeaRequirements, ProfileSource, SourceError};

/// Blend weights for the final score. Documented and stable: skill overlap
/// carries half the score, domain fit a fifth, judged synergy the rest.
pub const SKILL_WEIGHT: f64 = 0.5;
pub const DOMAIN_WEIGHT: f64 = 0.2;
pub const SYNERGY_WEIGHT: f64 = 0.3;

/// Synergy judgment returned by the model for one candidate.
#[derive(Debug, Deserialize)]
struct SynergyJudgment {
    /// Idea-specific fit, `[0, 1]`.
    synergy: f64,
    /// Why this candidate fits this specific idea.
    rationale: String,
}

/// Multi-source candidate matching and ranking.
///
/// Stateless: every call re-aggregates, so it is safe to retry and safe to
/// run concurrently for different ideas.
pub struct MatchingEngine {
    sources: Vec<Arc<dyn ProfileSource>>,
    invoker: Option<Arc<dyn ModelInvoker>>,
    source_timeout: Duration,
}

impl MatchingEngine {
    /// Create an engine over the given sources.
    ///
    /// `invoker` enables LLM-judged synergy; without it a deterministic
    /// heuristic substitutes.
    pub fn new(
        sources: Vec<Arc<dyn ProfileSource>>,
        invoker: Option<Arc<dyn ModelInvoker>>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            invoker,
            source_timeout,
        }
    }

    /// Find the best collaborator matches for an idea.
    ///
    /// Never returns `exclude_id`, never exceeds `top_k`, never returns
    /// duplicate candidates, and returns scores in non-increasing order.
    pub async fn find_matches(
        &self,
        idea_text: &str,
        top_k: usize,
        exclude_id: Option<&CandidateId>,
    ) -> Vec<MatchResult> {
        let requirements = parse_idea_requirements(idea_text);

        // 1. Aggregate all sources concurrently; a failed or slow source
        //    contributes nothing rather than aborting the request.
        let fetches = self.sources.iter().map(|source| {
            let requirements = requirements.clone();
            let source = Arc::clone(source);
            let timeout = self.source_timeout;
            async move {
                let result = tokio::time::timeout(timeout, source.fetch(&requirements))
                    .await
                    .map_err(|_| SourceError::Timeout)
                    .and_then(|r| r);
                (source.name(), result)
            }
        });

        let mut profiles: Vec<CandidateProfile> = Vec::new();
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(batch) => {
                    debug!(source = name, profiles = batch.len(), "Source contributed profiles");
                    profiles.extend(batch);
                }
                Err(e) => warn!(source = name, error = %e, "Source failed, continuing without it"),
            }
        }

        // 2. Dedup by (lowercase name, source), keeping the first fetched.
        let mut seen = HashSet::new();
        profiles.retain(|p| seen.insert(p.dedup_key()));

        // 3. Score every candidate concurrently.
        let scored = join_all(
            profiles
                .into_iter()
                .map(|profile| self.score_candidate(idea_text, &requirements, profile)),
        )
        .await;

        // 4. Rank: score desc, then domain fit, then source priority, then
        //    original fetch order (the sort is stable).
        let mut ranked = scored;
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.domain_fit.cmp(&a.domain_fit))
                .then_with(|| a.candidate.source.priority().cmp(&b.candidate.source.priority()))
        });

        // 5. Exclude before truncating.
        if let Some(exclude) = exclude_id {
            ranked.retain(|m| &m.candidate.id != exclude);
        }
        ranked.truncate(top_k);
        ranked
    }

    async fn score_candidate(
        &self,
        idea_text: &str,
        requirements: &IdeaRequirements,
        profile: CandidateProfile,
    ) -> MatchResult {
        let skill_overlap = jaccard(&requirements.required_skills, &profile.skills);
        let domain_fit = domain_fits(requirements, &profile);

        let (synergy, rationale) = match &self.invoker {
            Some(invoker) => match self.judge_synergy(invoker.as_ref(), idea_text, &profile).await {
                Some(judged) => judged,
                None => heuristic_synergy(requirements, &profile),
            },
            None => heuristic_synergy(requirements, &profile),
        };

        let score = 100.0
            * (skill_overlap * SKILL_WEIGHT
                + if domain_fit { DOMAIN_WEIGHT } else { 0.0 }
                + synergy.clamp(0.0, 1.0) * SYNERGY_WEIGHT);

        let filled: Vec<String> = requirements
            .required_skills
            .iter()
            .filter(|s| profile.skills.iter().any(|p| p.eq_ignore_ascii_case(s)))
            .take(4)
            .cloned()
            .collect();

        let first_name = profile.name.split_whitespace().next().unwrap_or("there").to_string();
        let skills_preview = if profile.skills.is_empty() {
            "your area".to_string()
        } else {
            profile.skills.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        };
        let intro = format!(
            "Hi {}, I noticed your experience in {}. I'm building a {} startup and think your \
             background could add real value - open to a short chat?",
            first_name, skills_preview, requirements.domain
        );

        MatchResult::new(profile, score, rationale, filled, domain_fit, intro)
    }

    async fn judge_synergy(
        &self,
        invoker: &dyn ModelInvoker,
        idea_text: &str,
        profile: &CandidateProfile,
    ) -> Option<(f64, String)> {
        let prompt = PromptTemplate::new(
            "You are an expert cofounder matchmaker. Judge deep, idea-specific synergy, \
             not generic skill matching. Return ONLY JSON.",
            format!(
                "Idea: {}\n\nCandidate: {}\nBio: {}\nSkills: {}\n\n\
                 Rate the synergy between candidate and THIS idea.",
                idea_text,
                profile.name,
                profile.bio.as_deref().unwrap_or("not provided"),
                profile.skills.join(", "),
            ),
        )
        .with_shape_hint(r#"{"synergy": <float 0-1>, "rationale": "<2-3 sentences>"}"#)
        .with_max_tokens(300);

        match invoke_json::<SynergyJudgment>(invoker, &prompt).await {
            Ok(judged) => Some((judged.synergy, judged.rationale)),
            Err(e) => {
                debug!(candidate = %profile.name, error = %e, "Synergy judgment failed, using heuristic");
                None
            }
        }
    }
}

/// Jaccard similarity over lowercase skill sets.
fn jaccard(required: &[String], offered: &[String]) -> f64 {
    if required.is_empty() || offered.is_empty() {
        return 0.0;
    }
    let required: HashSet<String> = required.iter().map(|s| s.to_lowercase()).collect();
    let offered: HashSet<String> = offered.iter().map(|s| s.to_lowercase()).collect();
    let intersection = required.intersection(&offered).count();
    let union = required.union(&offered).count();
    intersection as f64 / union.max(1) as f64
}

/// Whether the candidate's interests or bio align with the idea's domain.
fn domain_fits(requirements: &IdeaRequirements, profile: &CandidateProfile) -> bool {
    let domain = requirements.domain.to_lowercase();
    if domain == "other" {
        return false;
    }
    profile.interests.iter().any(|i| i.to_lowercase().contains(&domain))
        || profile
            .bio
            .as_deref()
            .map(|b| b.to_lowercase().contains(&domain))
            .unwrap_or(false)
}

/// Deterministic synergy substitute: bio keyword hits over required skills.
fn heuristic_synergy(
    requirements: &IdeaRequirements,
    profile: &CandidateProfile,
) -> (f64, String) {
    let bio = profile.bio.as_deref().unwrap_or("").to_lowercase();
    let hits = requirements
        .required_skills
        .iter()
        .filter(|s| bio.contains(s.as_str()))
        .count();
    let synergy = (0.3 + hits as f64 * 0.15).min(1.0);

    let matched: Vec<&str> = requirements
        .required_skills
        .iter()
        .filter(|s| profile.skills.iter().any(|p| p.eq_ignore_ascii_case(s)))
        .map(String::as_str)
        .collect();
    let rationale = if !matched.is_empty() {
        format!(
            "Covers {} required skill(s): {}. Profile shows aligned experience.",
            matched.len(),
            matched.join(", ")
        )
    } else if domain_fits(requirements, profile) {
        format!(
            "Shows interest or experience in the {} domain; could bridge domain knowledge \
             with product development.",
            requirements.domain
        )
    } else {
        "Limited explicit overlap; may still contribute complementary strengths.".to_string()
    };
    (synergy, rationale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ideaflow_core::ProfileKind;

    fn profile(id: &str, name: &str, source: ProfileKind, skills: &[&str], interests: &[&str]) -> CandidateProfile {
        CandidateProfile {
            id: CandidateId::new(id),
            name: name.to_string(),
            source,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            location: None,
            bio: None,
            contact_channels: Vec::new(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
        }
    }

    struct FixedSource {
        name: &'static str,
        profiles: Vec<CandidateProfile>,
    }

    #[async_trait]
    impl ProfileSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _req: &IdeaRequirements) -> Result<Vec<CandidateProfile>, SourceError> {
            Ok(self.profiles.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ProfileSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _req: &IdeaRequirements) -> Result<Vec<CandidateProfile>, SourceError> {
            Err(SourceError::Request("boom".to_string()))
        }
    }

    fn engine_with(sources: Vec<Arc<dyn ProfileSource>>) -> MatchingEngine {
        MatchingEngine::new(sources, None, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_scenario_b_top_k_exclude_ordering() {
        let directory: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "internal_directory",
            profiles: vec![
                profile("1", "Alpha", ProfileKind::InternalDirectory, &["ai", "python"], &["saas"]),
                profile("5", "Excluded", ProfileKind::InternalDirectory, &["ai", "python"], &["saas"]),
                profile("2", "Beta", ProfileKind::InternalDirectory, &["marketing"], &["saas"]),
                profile("3", "Gamma", ProfileKind::InternalDirectory, &["sales"], &[]),
                profile("4", "Delta", ProfileKind::InternalDirectory, &[], &[]),
            ],
        });

        let engine = engine_with(vec![directory]);
        let exclude = CandidateId::new("5");
        let matches = engine
            .find_matches("AI SaaS for freelancers", 3, Some(&exclude))
            .await;

        assert!(matches.len() <= 3);
        assert!(matches.iter().all(|m| m.candidate.id != exclude));
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_failing_source_yields_partial_results() {
        let good: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "internal_directory",
            profiles: vec![profile("1", "Alpha", ProfileKind::InternalDirectory, &["ai"], &["saas"])],
        });
        let bad: Arc<dyn ProfileSource> = Arc::new(FailingSource);

        let engine = engine_with(vec![bad, good]);
        let matches = engine.find_matches("AI SaaS tool", 10, None).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate.name, "Alpha");
    }

    #[tokio::test]
    async fn test_dedup_by_name_and_source() {
        let source: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "internal_directory",
            profiles: vec![
                profile("1", "Alex Tech", ProfileKind::InternalDirectory, &["ai"], &[]),
                profile("2", "alex tech", ProfileKind::InternalDirectory, &["ai"], &[]),
                profile("3", "Alex Tech", ProfileKind::ExternalRepository, &["ai"], &[]),
            ],
        });

        let engine = engine_with(vec![source]);
        let matches = engine.find_matches("AI tool", 10, None).await;
        // Same name+source collapses; same name from another source stays.
        assert_eq!(matches.len(), 2);
        let ids: HashSet<&str> = matches.iter().map(|m| m.candidate.id.as_str()).collect();
        assert!(ids.contains("1"));
        assert!(ids.contains("3"));
    }

    #[tokio::test]
    async fn test_tie_break_prefers_internal_directory() {
        // Same skills and interests, so identical scores; priority decides.
        let external: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "external_repository",
            profiles: vec![profile("10", "Ext", ProfileKind::ExternalRepository, &["ai"], &["saas"])],
        });
        let internal: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "internal_directory",
            profiles: vec![profile("20", "Int", ProfileKind::InternalDirectory, &["ai"], &["saas"])],
        });

        // External listed (and fetched) first; priority must still win.
        let engine = engine_with(vec![external, internal]);
        let matches = engine.find_matches("AI SaaS tool", 2, None).await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].candidate.name, "Int");
    }

    #[tokio::test]
    async fn test_no_duplicate_ids_in_results() {
        let source: Arc<dyn ProfileSource> = Arc::new(FixedSource {
            name: "internal_directory",
            profiles: vec![
                profile("1", "A", ProfileKind::InternalDirectory, &["ai"], &[]),
                profile("1", "A", ProfileKind::InternalDirectory, &["ai"], &[]),
            ],
        });
        let engine = engine_with(vec![source]);
        let matches = engine.find_matches("AI tool", 10, None).await;
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_jaccard() {
        let a = vec!["ai".to_string(), "python".to_string()];
        let b = vec!["Python".to_string(), "rust".to_string()];
        let sim = jaccard(&a, &b);
        assert!((sim - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&a, &[]), 0.0);
        assert_eq!(jaccard(&[], &b), 0.0);
    }

    #[test]
    fn test_blend_weights_sum_to_one() {
        assert!((SKILL_WEIGHT + DOMAIN_WEIGHT + SYNERGY_WEIGHT - 1.0).abs() < 1e-9);
    }
}
