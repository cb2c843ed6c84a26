//! Market analysis: viability profile for a `(concept, location)` segment.
//!
//! Profiles go through the read-through TTL cache, so repeating a request
//! for the same segment within the TTL serves the identical profile with no
//! second computation. The competitor signal is a stable hash of the
//! concept rather than a sampled value, so cached and recomputed profiles
//! for the same segment always agree.

use std::sync::Arc;

use async_trait::async_trait;

use ideaflow_core::{MarketProfile, Stage, StageOutput};

use crate::cache::{market_key, TtlCache};

use super::{PipelineStage, StageContext, StageError, StageExecution};

/// Viability blend: trend carries 60%, competition headroom 40%.
const TREND_WEIGHT: f64 = 0.6;
const COMPETITION_WEIGHT: f64 = 0.4;

pub type MarketCache = TtlCache<(String, String), MarketProfile>;

/// The market-analysis stage.
///
/// Carries no model dependency: signals are deterministic, so the execute
/// and fallback paths coincide and the stage never degrades.
pub struct MarketStage {
    cache: Arc<MarketCache>,
}

impl MarketStage {
    pub fn new(cache: Arc<MarketCache>) -> Self {
        Self { cache }
    }

    async fn profile_for(&self, ctx: &StageContext) -> MarketProfile {
        let concept = ctx.domain().to_string();
        let location = ctx.location().map(str::to_string);
        let key = market_key(&concept, location.as_deref());
        self.cache
            .get_or_compute(key.clone(), || async move {
                compute_profile(&key.0, &key.1)
            })
            .await
    }
}

#[async_trait]
impl PipelineStage for MarketStage {
    fn stage(&self) -> Stage {
        Stage::MarketAnalysis
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageExecution, StageError> {
        Ok(StageExecution::clean(StageOutput::Market(
            self.profile_for(ctx).await,
        )))
    }

    async fn fallback(&self, ctx: &StageContext) -> Result<StageOutput, StageError> {
        Ok(StageOutput::Market(self.profile_for(ctx).await))
    }
}

/// Compute a viability profile from deterministic segment signals.
pub fn compute_profile(concept: &str, location: &str) -> MarketProfile {
    let trend_score = trend_signal(concept, location);
    let competitor_count = competitor_signal(concept);

    // CompetitionBonus = max(0, 50 - competitors) / 10, so crowded segments
    // shed viability while empty ones gain up to 5 points of headroom.
    let competition_bonus = (50u32.saturating_sub(competitor_count)) as f64 / 10.0;
    let raw = trend_score * TREND_WEIGHT + competition_bonus * COMPETITION_WEIGHT;
    let viability_score = (raw * 10.0).round() / 10.0;
    let viability_score = viability_score.clamp(0.0, 5.0);

    let rationale = format!(
        "Trend({:.1})*{} + CompetitionBonus({:.1})*{} => {:.1}. Competitors={}.",
        trend_score, TREND_WEIGHT, competition_bonus, COMPETITION_WEIGHT, viability_score,
        competitor_count
    );

    MarketProfile {
        concept: concept.to_string(),
        location: location.to_string(),
        trend_score,
        competitor_count,
        viability_score,
        rationale,
    }
}

/// Normalized interest signal in `[0, 1]`, one decimal place.
fn trend_signal(concept: &str, location: &str) -> f64 {
    let h = fnv(&format!("{}|{}", concept, location));
    ((h % 101) as f64 / 100.0 * 10.0).round() / 10.0
}

/// Competitor estimate: crowded baseline for hot segments, plus a stable
/// per-concept spread.
fn competitor_signal(concept: &str) -> u32 {
    let base = match concept {
        "FINTECH" | "SAAS" | "FINANCE" => 60,
        _ => 25,
    };
    base + (fnv(concept) % 21) as u32
}

/// FNV-1a, the stable hash behind the deterministic signals.
fn fnv(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_profile_is_deterministic_and_bounded() {
        let a = compute_profile("FINTECH", "LONDON");
        let b = compute_profile("FINTECH", "LONDON");
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a.trend_score));
        assert!((0.0..=5.0).contains(&a.viability_score));
    }

    #[test]
    fn test_distinct_segments_differ() {
        let a = compute_profile("FINTECH", "LONDON");
        let b = compute_profile("EDTECH", "GLOBAL");
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_round_trip() {
        let cache: Arc<MarketCache> = TtlCache::new(Duration::from_secs(60));
        let stage = MarketStage::new(Arc::clone(&cache));
        let ctx = StageContext::new("a fintech app for invoices", None);

        let first = stage.execute(&ctx).await.unwrap();
        let second = stage.execute(&ctx).await.unwrap();
        match (first.output, second.output) {
            (StageOutput::Market(a), StageOutput::Market(b)) => assert_eq!(a, b),
            other => panic!("unexpected outputs: {:?}", other),
        }
        assert_eq!(cache.len().await, 1);
    }
}
