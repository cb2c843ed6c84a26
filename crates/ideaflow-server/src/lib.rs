//! Ideaflow Orchestrator Server Library
//!
//! This crate provides the orchestration core: the workflow state machine,
//! the stage library, the dimensional analyzer, conversation memory, the
//! progress broadcaster, the market-profile cache, the candidate matching
//! engine, and the HTTP/SSE/WebSocket surface.

pub mod analyzer;
pub mod auth;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod http;
pub mod matching;
pub mod memory;
pub mod orchestrator;
pub mod stages;
pub mod state;

pub use config::Config;
pub use orchestrator::{Orchestrator, OrchestratorError, RunHandle};
pub use state::AppState;
