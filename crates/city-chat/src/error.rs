//! Chat and dialogue error types.

use thiserror::Error;

/// Errors from LLM calls and reply interpretation.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// LLM response was not valid JSON.
    #[error("Failed to parse LLM response as JSON: {0}")]
    Parse(String),

    /// LLM response parsed but had the wrong shape.
    #[error("LLM output schema validation failed: {0}")]
    Schema(String),

    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Timeout(0)
        } else if err.is_connect() {
            ChatError::Unavailable(err.to_string())
        } else {
            ChatError::RequestFailed(err.to_string())
        }
    }
}
