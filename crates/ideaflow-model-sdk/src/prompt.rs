//! Prompt templates with a stricter repair variant.

/// A prompt template: system instructions plus the user turn, with an
/// optional shape hint used to build the repair prompt after a parse
/// failure.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
    /// JSON shape the caller expects, quoted back to the model on repair.
    pub shape_hint: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptTemplate {
    /// Create a template with the default sampling settings.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            shape_hint: None,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    /// Attach the JSON shape the caller expects.
    pub fn with_shape_hint(mut self, hint: impl Into<String>) -> Self {
        self.shape_hint = Some(hint.into());
        self
    }

    /// Builder method to set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builder method to set the output token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the stricter variant sent after a parse failure.
    ///
    /// Never identical to the original prompt: it quotes the parse error
    /// and the expected shape, and pins temperature to zero.
    pub fn repair(&self, parse_error: &str) -> PromptTemplate {
        let shape = self
            .shape_hint
            .as_deref()
            .unwrap_or("the JSON object described in the instructions");
        let user = format!(
            "{}\n\nYour previous answer could not be parsed ({}). \
             Return ONLY a single valid JSON object matching {} - \
             no markdown fences, no commentary, no extra fields.",
            self.user, parse_error, shape
        );
        PromptTemplate {
            system: self.system.clone(),
            user,
            shape_hint: self.shape_hint.clone(),
            temperature: 0.0,
            max_tokens: self.max_tokens,
        }
    }
}
