//! Candidate matching and ranking.
//!
//! Stateless and side-effect-free: aggregation over independent profile
//! sources, normalization and dedup, blended scoring, and a stable ranking
//! with documented tie-breaks. Safe to call concurrently for different
//! ideas and safe to retry.

mod engine;
mod sources;

pub use engine::{MatchingEngine, DOMAIN_WEIGHT, SKILL_WEIGHT, SYNERGY_WEIGHT};
pub use sources::{
    parse_idea_requirements, DirectorySource, IdeaRequirements, ProfileSource, RepositorySource,
    SourceError, SynthesizedSource,
};
