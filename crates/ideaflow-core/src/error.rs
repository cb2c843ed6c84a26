//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Ideaflow.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Submission rejected before orchestration started.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Conversation has no recorded history.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}
