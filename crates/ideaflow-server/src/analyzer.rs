//! Dimensional analysis of a startup idea.
//!
//! Scores an idea across the eight fixed dimensions plus a domain
//! classification, via the model adapter. Every numeric field from the
//! model is clamped into `[0, 1]`; anything missing or malformed is
//! replaced by a documented neutral default instead of failing the stage.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use ideaflow_core::score::{Complexity, DimensionalScore, NEUTRAL_SCORE, NUMERIC_DIMENSIONS};
use ideaflow_model_sdk::{invoke_json, AdapterError, ModelInvoker, PromptTemplate};

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a senior venture analyst with 15+ years \
evaluating startup pitches. Analyze the idea with brutal honesty across eight dimensions. \
Avoid round numbers like 0.5 or 1.0; use nuanced scores such as 0.72 or 0.34. Every \
explanation must cite specific words from the idea. If critical information is missing \
(for example no competitor research), score market_validation low (0.2-0.4). \
Return ONLY a JSON object, no markdown fences, no commentary.";

const ANALYSIS_SHAPE: &str = r#"{
  "scores": {
    "clarity": <float 0-1>,
    "significance": <float 0-1>,
    "specificity": <float 0-1>,
    "complexity": "low" | "medium" | "high",
    "market_validation": <float 0-1>,
    "technical_viability": <float 0-1>,
    "differentiation": <float 0-1>,
    "scalability": <float 0-1>
  },
  "explanations": { "<dimension>": "<2-3 sentence reason citing the idea>" },
  "focus_areas": ["<specific action>", ...],
  "top_strengths": ["<specific strength>", ...],
  "domain": ["<domain1>", "<domain2>"],
  "domain_confidence": <float 0-1>
}"#;

/// Raw model payload before validation and clamping.
///
/// Score values are kept as raw JSON so a stray string or null degrades to
/// the neutral default instead of rejecting the whole payload.
#[derive(Debug, Default, Deserialize)]
pub struct RawDimensionalPayload {
    #[serde(default)]
    scores: serde_json::Map<String, Value>,
    #[serde(default)]
    explanations: serde_json::Map<String, Value>,
    #[serde(default)]
    focus_areas: Vec<String>,
    #[serde(default)]
    top_strengths: Vec<String>,
    #[serde(default)]
    domain: Vec<String>,
    #[serde(default)]
    domain_confidence: Option<Value>,
}

/// The dimensional analyzer.
pub struct DimensionalAnalyzer;

impl DimensionalAnalyzer {
    /// Analyze an idea via the model, validating and clamping the output.
    pub async fn analyze(
        invoker: &dyn ModelInvoker,
        idea_text: &str,
        prior_context: Option<&str>,
    ) -> Result<DimensionalScore, AdapterError> {
        let prompt = build_prompt(idea_text, prior_context);
        let raw: RawDimensionalPayload = invoke_json(invoker, &prompt).await?;
        let mut score = validate_payload(raw);
        if score.explanations.is_empty() {
            debug!("Model omitted explanations, generating rule-based ones");
            score.explanations = heuristic_explanations(&score);
        }
        Ok(score)
    }

    /// Deterministic neutral score used when the backend is unreachable.
    pub fn fallback() -> DimensionalScore {
        let mut score = DimensionalScore::default();
        score.explanations = heuristic_explanations(&score);
        score
    }
}

fn build_prompt(idea_text: &str, prior_context: Option<&str>) -> PromptTemplate {
    let mut user = format!("Startup idea:\n{}\n", idea_text);
    if let Some(context) = prior_context {
        user.push_str("\n");
        user.push_str(context);
        user.push('\n');
    }
    user.push_str("\nScore all eight dimensions and classify 1-3 domains. Return ONLY the JSON object.");
    PromptTemplate::new(ANALYSIS_SYSTEM_PROMPT, user)
        .with_shape_hint(ANALYSIS_SHAPE)
        .with_max_tokens(1400)
}

/// Clamp and default every field of the raw payload.
fn validate_payload(raw: RawDimensionalPayload) -> DimensionalScore {
    let RawDimensionalPayload {
        scores,
        explanations,
        mut focus_areas,
        mut top_strengths,
        domain,
        domain_confidence,
    } = raw;

    let score_of = |name: &str| clamp_unit(scores.get(name));

    let complexity = match scores.get("complexity").and_then(Value::as_str) {
        Some("low") => Complexity::Low,
        Some("high") => Complexity::High,
        _ => Complexity::Medium,
    };

    let mut domains: Vec<String> = domain
        .iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect();
    domains.dedup();
    domains.truncate(3);
    if domains.is_empty() {
        domains.push("general".to_string());
    }

    let explanations: BTreeMap<String, String> = explanations
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect();

    focus_areas.truncate(3);
    top_strengths.truncate(2);

    DimensionalScore {
        clarity: score_of("clarity"),
        significance: score_of("significance"),
        specificity: score_of("specificity"),
        market_validation: score_of("market_validation"),
        technical_viability: score_of("technical_viability"),
        differentiation: score_of("differentiation"),
        scalability: score_of("scalability"),
        complexity,
        domains,
        domain_confidence: clamp_unit(domain_confidence.as_ref()),
        explanations,
        focus_areas,
        top_strengths,
    }
}

/// Coerce a raw JSON value into `[0, 1]`, neutral on anything unusable.
fn clamp_unit(value: Option<&Value>) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => NEUTRAL_SCORE,
    }
}

/// Rule-based per-dimension rationale, used when the model provides none.
fn heuristic_explanations(score: &DimensionalScore) -> BTreeMap<String, String> {
    let band = |v: f64, strong: &str, middling: &str, weak: &str| {
        if v >= 0.7 {
            format!("Strong ({:.2}/1.0): {}", v, strong)
        } else if v >= 0.4 {
            format!("Moderate ({:.2}/1.0): {}", v, middling)
        } else {
            format!("Weak ({:.2}/1.0): {}", v, weak)
        }
    };

    let mut out = BTreeMap::new();
    for (name, value) in NUMERIC_DIMENSIONS.iter().zip(score.numeric_fields()) {
        let text = match *name {
            "clarity" => band(
                value,
                "the problem statement identifies a concrete pain point.",
                "the problem is identified but could name who faces it and when.",
                "the problem description is vague; name the pain and who feels it.",
            ),
            "significance" => band(
                value,
                "the problem appears to affect many people with real cost.",
                "the problem matters but its scope is unquantified.",
                "no indicators of widespread impact; is this must-have or nice-to-have?",
            ),
            "specificity" => band(
                value,
                "the solution describes concrete mechanisms and features.",
                "a core concept exists but lacks implementation detail.",
                "the solution is abstract; describe what the product actually does.",
            ),
            "market_validation" => band(
                value,
                "evidence of demand is present (competitors, research, or traction).",
                "limited validation; talk to potential users and study competitors.",
                "no demand evidence; validate with users before building.",
            ),
            "technical_viability" => band(
                value,
                "buildable with current technology, no major blockers.",
                "possible but needs skilled execution.",
                "significant technical risk; prototype the hardest part first.",
            ),
            "differentiation" => band(
                value,
                "the approach is meaningfully different from existing solutions.",
                "an incremental improvement; find the 10x angle.",
                "reads like existing offerings; identify the unfair advantage.",
            ),
            "scalability" => band(
                value,
                "clear path to grow beyond the initial market.",
                "growth is plausible but may be constrained by geography or niche.",
                "appears inherently local or niche-bound.",
            ),
            _ => continue,
        };
        out.insert((*name).to_string(), text);
    }
    out.insert(
        "complexity".to_string(),
        match score.complexity {
            Complexity::Low => "Standard web/mobile stack; fast time-to-market.".to_string(),
            Complexity::Medium => "Some technical challenges, within reach for an experienced team.".to_string(),
            Complexity::High => "Deep tech or novel algorithms; longer timeline, stronger moat.".to_string(),
        },
    );
    out
}
