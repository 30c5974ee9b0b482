//! Inference gateway for an Ollama-compatible backend
//!
//! Features:
//! - Category-keyed prompt construction with a fixed template set
//! - Blocking generation (full response per call)
//! - Streaming generation relayed as an incremental event stream

pub mod gateway;
pub mod prompt;

pub use gateway::{
    BackendHealth, ChatRequest, ChatResponse, GatewayConfig, InferenceGateway, StreamEvent,
};
pub use prompt::{build_prompt, clean_response, PromptCategory};

use thiserror::Error;

/// Inference gateway errors
///
/// Each upstream failure kind is a distinct variant so callers can report
/// an accurate status (timeout vs. unreachable vs. bad status vs. empty).
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request to inference backend timed out")]
    Timeout,

    #[error("Inference backend unreachable: {0}")]
    Unreachable(String),

    #[error("Inference backend returned status {0}")]
    BadStatus(u16),

    #[error("Inference backend returned an empty generation")]
    EmptyGeneration,

    #[error("Invalid response from inference backend: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Unreachable(err.to_string())
        } else {
            LlmError::InvalidResponse(err.to_string())
        }
    }
}
