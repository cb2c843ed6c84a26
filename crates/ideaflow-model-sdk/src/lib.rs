//! Model Invocation Adapter for Ideaflow
//!
//! This crate wraps calls to an OpenAI-compatible chat-completions backend
//! and classifies every failure into one of three classes so callers can
//! choose a recovery path instead of catching broad errors:
//!
//! - [`AdapterError::Parse`] - the backend answered, but not in the expected
//!   shape. One repair attempt with a stricter prompt is made before this
//!   surfaces.
//! - [`AdapterError::RateLimited`] - retried with bounded exponential
//!   backoff (max 3 attempts) before surfacing.
//! - [`AdapterError::Unavailable`] - network failure, timeout or 5xx.
//!   Surfaced immediately; retrying a down backend wastes the caller's
//!   time budget.
//!
//! The [`ModelInvoker`] trait is the seam stages and tests program against;
//! [`ModelClient`] is the production implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use ideaflow_model_sdk::{invoke_json, ModelClient, PromptTemplate};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Title { title: String }
//!
//! async fn refine(client: &ModelClient) -> Result<(), Box<dyn std::error::Error>> {
//!     let prompt = PromptTemplate::new("You name products.", "Name a note-taking app.")
//!         .with_shape_hint(r#"{"title": "<string>"}"#);
//!     let out: Title = invoke_json(client, &prompt).await?;
//!     println!("{}", out.title);
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod json;
mod prompt;
mod types;

pub use client::{invoke_json, ModelClient, ModelInvoker};
pub use error::AdapterError;
pub use json::extract_json;
pub use prompt::PromptTemplate;
pub use types::{ChatMessage, ChatRequest, ChatResponse};
