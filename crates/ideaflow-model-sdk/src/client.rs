//! Model client and the invoker seam.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::json::extract_json;
use crate::prompt::PromptTemplate;
use crate::types::{ChatMessage, ChatRequest, ChatResponse};

/// Maximum attempts when the backend rate-limits a request.
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Base delay for rate-limit backoff; doubles per attempt plus jitter.
const BACKOFF_BASE_MS: u64 = 500;

/// The seam stages and tests program against.
///
/// `complete` resolves a prompt to raw text, already classified: rate
/// limits are retried internally, unavailability surfaces immediately.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn complete(&self, prompt: &PromptTemplate) -> Result<String, AdapterError>;
}

/// Invoke the model and parse its output into `T`.
///
/// On a parse failure exactly one repair attempt is made with a stricter
/// prompt; a second failure surfaces [`AdapterError::Parse`]. The identical
/// failing prompt is never sent a third time.
pub async fn invoke_json<T: DeserializeOwned>(
    invoker: &dyn ModelInvoker,
    prompt: &PromptTemplate,
) -> Result<T, AdapterError> {
    let raw = invoker.complete(prompt).await?;
    match parse_payload::<T>(&raw) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            debug!(error = %first_error, "Model output failed to parse, sending repair prompt");
            let repair = prompt.repair(&first_error);
            let raw = invoker.complete(&repair).await?;
            parse_payload::<T>(&raw).map_err(|second_error| {
                warn!(error = %second_error, "Repair attempt also failed to parse");
                AdapterError::Parse(second_error)
            })
        }
    }
}

fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object in output".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Production client for an OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ModelClient {
    /// Create a client for the given backend.
    ///
    /// `timeout` bounds every request; a timeout is classified as
    /// [`AdapterError::Unavailable`], never retried.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AdapterError::NotConfigured("API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::NotConfigured(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    async fn send(&self, prompt: &PromptTemplate) -> Result<String, AdapterError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(&prompt.system),
                ChatMessage::user(&prompt.user),
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AdapterError::RateLimited { attempts: 1 });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Unavailable(format!(
                "backend returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("malformed response body: {}", e)))?;
        parsed
            .content()
            .map(str::to_owned)
            .ok_or_else(|| AdapterError::Parse("backend returned no choices".to_string()))
    }
}

#[async_trait]
impl ModelInvoker for ModelClient {
    /// Complete a prompt, absorbing rate limits with bounded backoff.
    async fn complete(&self, prompt: &PromptTemplate) -> Result<String, AdapterError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(prompt).await {
                Ok(content) => return Ok(content),
                Err(AdapterError::RateLimited { .. }) if attempt < MAX_RATE_LIMIT_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(AdapterError::RateLimited { .. }) => {
                    return Err(AdapterError::RateLimited { attempts: attempt });
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Exponential backoff with jitter: base * 2^(attempt-1) + [0, base/2).
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt - 1).min(4));
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_BASE_MS / 2);
    Duration::from_millis(exp + jitter)
}

fn classify_transport_error(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::Unavailable("request timed out".to_string())
    } else {
        AdapterError::Unavailable(e.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Deserialize, Debug)]
    struct Score {
        score: f64,
    }

    /// Invoker scripted with a sequence of responses.
    struct ScriptedInvoker {
        responses: Vec<Result<String, AdapterError>>,
        calls: AtomicU32,
    }

    impl ScriptedInvoker {
        fn new(responses: Vec<Result<String, AdapterError>>) -> Self {
            Self {
                responses,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn complete(&self, _prompt: &PromptTemplate) -> Result<String, AdapterError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            match self.responses.get(idx) {
                Some(Ok(s)) => Ok(s.clone()),
                Some(Err(AdapterError::Parse(m))) => Err(AdapterError::Parse(m.clone())),
                Some(Err(AdapterError::RateLimited { attempts })) => {
                    Err(AdapterError::RateLimited { attempts: *attempts })
                }
                Some(Err(AdapterError::Unavailable(m))) => Err(AdapterError::Unavailable(m.clone())),
                Some(Err(AdapterError::NotConfigured(m))) => {
                    Err(AdapterError::NotConfigured(m.clone()))
                }
                None => Err(AdapterError::Unavailable("script exhausted".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_invoke_json_parses_first_try() {
        let invoker = ScriptedInvoker::new(vec![Ok(r#"{"score": 0.8}"#.to_string())]);
        let prompt = PromptTemplate::new("s", "u");
        let out: Score = invoke_json(&invoker, &prompt).await.unwrap();
        assert_eq!(out.score, 0.8);
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_invoke_json_repairs_once() {
        let invoker = ScriptedInvoker::new(vec![
            Ok("not json at all".to_string()),
            Ok("```json\n{\"score\": 0.4}\n```".to_string()),
        ]);
        let prompt = PromptTemplate::new("s", "u").with_shape_hint(r#"{"score": <float>}"#);
        let out: Score = invoke_json(&invoker, &prompt).await.unwrap();
        assert_eq!(out.score, 0.4);
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_invoke_json_never_tries_thrice() {
        let invoker = ScriptedInvoker::new(vec![
            Ok("garbage".to_string()),
            Ok("still garbage".to_string()),
            Ok(r#"{"score": 1.0}"#.to_string()),
        ]);
        let prompt = PromptTemplate::new("s", "u");
        let err = invoke_json::<Score>(&invoker, &prompt).await.unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
        // The scripted success on call 3 must never be reached.
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_passes_through() {
        let invoker = ScriptedInvoker::new(vec![Err(AdapterError::Unavailable("down".into()))]);
        let prompt = PromptTemplate::new("s", "u");
        let err = invoke_json::<Score>(&invoker, &prompt).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(invoker.calls(), 1);
    }

    #[test]
    fn test_backoff_grows() {
        let first = backoff_delay(1);
        let third = backoff_delay(3);
        assert!(first >= Duration::from_millis(BACKOFF_BASE_MS));
        assert!(third >= Duration::from_millis(BACKOFF_BASE_MS * 4));
    }

    #[test]
    fn test_client_requires_api_key() {
        let err = ModelClient::new("https://api.example.com", "", "m", Duration::from_secs(12))
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured(_)));
    }
}
