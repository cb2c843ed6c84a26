//! Dimensional scoring of a startup idea.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall technical difficulty of building the idea.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

/// The seven weighted numeric dimensions, in scoring order.
pub const NUMERIC_DIMENSIONS: [&str; 7] = [
    "clarity",
    "significance",
    "specificity",
    "market_validation",
    "technical_viability",
    "differentiation",
    "scalability",
];

/// Fixed weights for the overall score, aligned with [`NUMERIC_DIMENSIONS`].
///
/// These sum to 1.0. They are a configuration constant of the analyzer, not
/// hidden logic; changing them changes every overall score uniformly.
pub const DIMENSION_WEIGHTS: [f64; 7] = [0.15, 0.20, 0.10, 0.20, 0.10, 0.15, 0.10];

/// Neutral default when the model omits or mangles a numeric dimension.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Scores for an idea across the eight fixed dimensions plus domain labels.
///
/// All numeric fields are clamped to `[0.0, 1.0]` at construction time by
/// the analyzer; consumers can rely on the bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalScore {
    /// How well-defined and specific the problem is.
    pub clarity: f64,
    /// How important/impactful the problem is.
    pub significance: f64,
    /// How concrete the solution approach is.
    pub specificity: f64,
    /// Evidence of existing demand.
    pub market_validation: f64,
    /// Whether the idea can realistically be built.
    pub technical_viability: f64,
    /// Uniqueness compared to alternatives.
    pub differentiation: f64,
    /// Growth potential.
    pub scalability: f64,
    /// Categorical difficulty estimate.
    pub complexity: Complexity,
    /// Up to three lowercase domain labels, most relevant first.
    pub domains: Vec<String>,
    /// Confidence in the domain classification, `[0.0, 1.0]`.
    pub domain_confidence: f64,
    /// Short natural-language rationale per dimension, for display.
    pub explanations: BTreeMap<String, String>,
    /// Up to three actionable focus areas from the analysis.
    pub focus_areas: Vec<String>,
    /// Up to two standout strengths from the analysis.
    pub top_strengths: Vec<String>,
}

impl DimensionalScore {
    /// Numeric fields in [`NUMERIC_DIMENSIONS`] order.
    pub fn numeric_fields(&self) -> [f64; 7] {
        [
            self.clarity,
            self.significance,
            self.specificity,
            self.market_validation,
            self.technical_viability,
            self.differentiation,
            self.scalability,
        ]
    }

    /// Weighted mean of the numeric dimensions under [`DIMENSION_WEIGHTS`].
    ///
    /// Pure and deterministic: the same dimension values always produce the
    /// same overall score.
    pub fn overall_score(&self) -> f64 {
        self.numeric_fields()
            .iter()
            .zip(DIMENSION_WEIGHTS.iter())
            .map(|(score, weight)| score * weight)
            .sum()
    }

    /// Primary domain label, if any.
    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }
}

impl Default for DimensionalScore {
    /// The neutral score used when analysis produces nothing usable.
    fn default() -> Self {
        Self {
            clarity: NEUTRAL_SCORE,
            significance: NEUTRAL_SCORE,
            specificity: NEUTRAL_SCORE,
            market_validation: NEUTRAL_SCORE,
            technical_viability: NEUTRAL_SCORE,
            differentiation: NEUTRAL_SCORE,
            scalability: NEUTRAL_SCORE,
            complexity: Complexity::Medium,
            domains: vec!["general".to_string()],
            domain_confidence: 0.3,
            explanations: BTreeMap::new(),
            focus_areas: Vec::new(),
            top_strengths: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = DIMENSION_WEIGHTS.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_score_deterministic() {
        let score = DimensionalScore {
            clarity: 0.72,
            significance: 0.45,
            specificity: 0.88,
            market_validation: 0.34,
            technical_viability: 0.91,
            differentiation: 0.56,
            scalability: 0.63,
            ..DimensionalScore::default()
        };
        let first = score.overall_score();
        let second = score.overall_score();
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn test_neutral_default_overall() {
        let score = DimensionalScore::default();
        assert!((score.overall_score() - NEUTRAL_SCORE).abs() < 1e-9);
        assert_eq!(score.complexity, Complexity::Medium);
        assert_eq!(score.primary_domain(), Some("general"));
    }

    #[test]
    fn test_extremes_stay_bounded() {
        let mut score = DimensionalScore::default();
        score.clarity = 1.0;
        score.significance = 1.0;
        score.specificity = 1.0;
        score.market_validation = 1.0;
        score.technical_viability = 1.0;
        score.differentiation = 1.0;
        score.scalability = 1.0;
        assert!((score.overall_score() - 1.0).abs() < 1e-9);
    }
}
