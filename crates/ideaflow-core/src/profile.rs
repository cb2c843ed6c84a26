//! Candidate profiles and match results.

use crate::ids::CandidateId;
use serde::{Deserialize, Serialize};

/// Origin of a candidate profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Harvested from an external code-hosting/repository search.
    ExternalRepository,
    /// From the internal member directory.
    InternalDirectory,
    /// Generated persona complementing the real profiles.
    Synthesized,
}

impl ProfileKind {
    /// Tie-break priority for ranking: lower sorts first.
    pub fn priority(&self) -> u8 {
        match self {
            ProfileKind::InternalDirectory => 0,
            ProfileKind::ExternalRepository => 1,
            ProfileKind::Synthesized => 2,
        }
    }
}

/// A normalized collaborator profile from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: CandidateId,
    pub name: String,
    pub source: ProfileKind,
    pub skills: Vec<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    /// Ways to reach the candidate (profile URLs, handles, emails).
    pub contact_channels: Vec<String>,
    /// Free-form interest tags used for domain-fit checks.
    pub interests: Vec<String>,
}

impl CandidateProfile {
    /// Deduplication key: lowercase name plus source.
    ///
    /// Two records with the same name from different sources are kept; the
    /// same name from the same source is a duplicate.
    pub fn dedup_key(&self) -> (String, ProfileKind) {
        (self.name.to_lowercase(), self.source)
    }
}

/// Recommended follow-up action, bucketed from the match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    MustConnect,
    StrongOption,
    Explore,
    Review,
}

impl RecommendedAction {
    /// Bucket a `[0, 100]` score into an action.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RecommendedAction::MustConnect
        } else if score >= 60.0 {
            RecommendedAction::StrongOption
        } else if score >= 40.0 {
            RecommendedAction::Explore
        } else {
            RecommendedAction::Review
        }
    }
}

/// A single ranked collaborator match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate: CandidateProfile,
    /// Blended compatibility score, clamped to `[0, 100]`.
    pub score: f64,
    /// Why this candidate fits this specific idea.
    pub rationale: String,
    pub recommended_action: RecommendedAction,
    /// Required skills this candidate covers.
    pub filled_skill_gaps: Vec<String>,
    /// Whether the candidate's interests/bio align with the idea's domain.
    pub domain_fit: bool,
    /// Personalized opener to send to the candidate.
    pub intro_message: String,
}

impl MatchResult {
    /// Build a match with the score clamped and the action derived from it.
    pub fn new(
        candidate: CandidateProfile,
        score: f64,
        rationale: impl Into<String>,
        filled_skill_gaps: Vec<String>,
        domain_fit: bool,
        intro_message: impl Into<String>,
    ) -> Self {
        let score = score.clamp(0.0, 100.0);
        Self {
            candidate,
            score,
            rationale: rationale.into(),
            recommended_action: RecommendedAction::from_score(score),
            filled_skill_gaps,
            domain_fit,
            intro_message: intro_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, source: ProfileKind) -> CandidateProfile {
        CandidateProfile {
            id: CandidateId::new(name),
            name: name.to_string(),
            source,
            skills: vec!["rust".to_string()],
            location: None,
            bio: None,
            contact_channels: Vec::new(),
            interests: Vec::new(),
        }
    }

    #[test]
    fn test_dedup_key_case_insensitive() {
        let a = candidate("Alex Tech", ProfileKind::InternalDirectory);
        let b = candidate("alex tech", ProfileKind::InternalDirectory);
        let c = candidate("Alex Tech", ProfileKind::ExternalRepository);
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_source_priority_order() {
        assert!(ProfileKind::InternalDirectory.priority() < ProfileKind::ExternalRepository.priority());
        assert!(ProfileKind::ExternalRepository.priority() < ProfileKind::Synthesized.priority());
    }

    #[test]
    fn test_action_buckets() {
        assert_eq!(RecommendedAction::from_score(95.0), RecommendedAction::MustConnect);
        assert_eq!(RecommendedAction::from_score(80.0), RecommendedAction::MustConnect);
        assert_eq!(RecommendedAction::from_score(79.9), RecommendedAction::StrongOption);
        assert_eq!(RecommendedAction::from_score(60.0), RecommendedAction::StrongOption);
        assert_eq!(RecommendedAction::from_score(59.0), RecommendedAction::Explore);
        assert_eq!(RecommendedAction::from_score(40.0), RecommendedAction::Explore);
        assert_eq!(RecommendedAction::from_score(39.9), RecommendedAction::Review);
        assert_eq!(RecommendedAction::from_score(0.0), RecommendedAction::Review);
    }

    #[test]
    fn test_match_result_clamps_score() {
        let m = MatchResult::new(
            candidate("Ava", ProfileKind::Synthesized),
            130.0,
            "overlap",
            vec![],
            false,
            "hi",
        );
        assert_eq!(m.score, 100.0);
        assert_eq!(m.recommended_action, RecommendedAction::MustConnect);

        let m = MatchResult::new(
            candidate("Ava", ProfileKind::Synthesized),
            -3.0,
            "overlap",
            vec![],
            false,
            "hi",
        );
        assert_eq!(m.score, 0.0);
        assert_eq!(m.recommended_action, RecommendedAction::Review);
    }
}
