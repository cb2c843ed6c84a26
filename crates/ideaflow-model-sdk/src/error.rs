//! Error types for the model invocation adapter.

use thiserror::Error;

/// Classified failures from the model backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Backend returned data not matching the expected shape, even after
    /// the single permitted repair attempt.
    #[error("Model output did not match the expected shape: {0}")]
    Parse(String),

    /// Backend rejected the request with a rate limit after all retries.
    #[error("Model backend rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Backend unreachable: network failure, timeout, or server error.
    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    /// No backend configured (missing API key or base URL).
    #[error("Model backend not configured: {0}")]
    NotConfigured(String),
}

impl AdapterError {
    /// True when the stage should fall back immediately without retrying.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AdapterError::Unavailable(_) | AdapterError::NotConfigured(_))
    }
}
