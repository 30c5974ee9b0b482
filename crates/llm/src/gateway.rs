//! Inference gateway
//!
//! Turns a [`ChatRequest`] into a fully-specified generation call against an
//! Ollama-compatible backend (`POST /api/generate`, `GET /api/tags`) and
//! returns either a single [`ChatResponse`] or a live sequence of
//! [`StreamEvent`].

use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::prompt::{build_prompt, clean_response, stop_sequences, PromptCategory};
use crate::LlmError;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend base URL
    pub endpoint: String,
    /// Model name/ID
    pub model: String,
    /// Timeout covering a full generation call (blocking or streamed)
    pub chat_timeout: Duration,
    /// Timeout for the health probe
    pub health_timeout: Duration,
    /// Timeout for the model listing proxy
    pub models_timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Top-k sampling threshold
    pub top_k: u32,
    /// Repetition penalty
    pub repeat_penalty: f32,
    /// Maximum tokens to generate
    pub num_predict: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            chat_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
            models_timeout: Duration::from_secs(10),
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            num_predict: 800,
        }
    }
}

/// Incoming chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub chat_id: Option<String>,
}

fn default_category() -> String {
    PromptCategory::General.as_str().to_string()
}

/// Completed (non-streaming) chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: Option<String>,
}

/// One unit of the chat streaming protocol
///
/// Serializes to exactly one of `{"content": ...}`, `{"done": true}`, or
/// `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { content: text.into() }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }
}

/// Backend reachability snapshot, produced by the health probe
#[derive(Debug, Clone)]
pub struct BackendHealth {
    /// Number of models the backend reports as available
    pub models_available: usize,
}

/// Gateway to the inference backend
pub struct InferenceGateway {
    client: Client,
    config: GatewayConfig,
}

impl InferenceGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Model the gateway generates with
    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    /// Blocking generation: one request, one full response
    ///
    /// Fails with a distinct error for each upstream failure kind: timeout,
    /// unreachable, non-200 status, or an empty generation after the
    /// role-delimiter artifacts are stripped.
    pub async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let category = PromptCategory::parse(&request.category);
        let body = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(category, &request.message),
            stream: false,
            options: self.options(true),
        };

        tracing::debug!(category = %category, model = %self.config.model, "generating response");

        let response = self
            .client
            .post(self.api_url("/generate"))
            .timeout(self.config.chat_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::BadStatus(status.as_u16()));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = clean_response(&payload.response);
        if text.is_empty() {
            return Err(LlmError::EmptyGeneration);
        }

        tracing::debug!(chars = text.len(), "generation complete");

        Ok(ChatResponse {
            response: text,
            category: request.category.clone(),
            timestamp: Utc::now(),
            chat_id: request.chat_id.clone(),
        })
    }

    /// Streaming generation: one long-lived connection, events as they arrive
    ///
    /// The returned sequence is lazy and single-pass. The backend speaks
    /// newline-delimited JSON; fragments may split across read boundaries,
    /// so a line buffer reassembles them and lines that still do not parse
    /// are skipped rather than treated as fatal. A `done` fragment is the
    /// only normal termination. A non-200 connect (or a transport failure)
    /// yields a single error event. Dropping the stream drops the upstream
    /// connection, so consumer cancellation propagates promptly.
    pub fn generate_stream(
        &self,
        request: &ChatRequest,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let category = PromptCategory::parse(&request.category);
        let body = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(category, &request.message),
            stream: true,
            // Stop sequences are not required when consuming incrementally
            options: self.options(false),
        };
        let client = self.client.clone();
        let url = self.api_url("/generate");
        let timeout = self.config.chat_timeout;

        stream! {
            let response = match client.post(&url).timeout(timeout).json(&body).send().await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(error = %err, "streaming connect to inference backend failed");
                    yield StreamEvent::error("backend error");
                    return;
                }
            };

            if !response.status().is_success() {
                tracing::warn!(status = %response.status(), "inference backend refused stream");
                yield StreamEvent::error("backend error");
                return;
            }

            let mut chunks = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        tracing::warn!(error = %err, "inference stream broke mid-generation");
                        yield StreamEvent::error("stream interrupted");
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    if line.is_empty() {
                        continue;
                    }

                    let fragment = match serde_json::from_str::<GenerateChunk>(&line) {
                        Ok(fragment) => fragment,
                        // Partial or malformed line; tolerated
                        Err(_) => continue,
                    };

                    if let Some(content) = fragment.response {
                        yield StreamEvent::content(content);
                    }
                    if fragment.done {
                        yield StreamEvent::done();
                        return;
                    }
                }
            }

            // The backend may close the stream without a trailing newline;
            // whatever is left in the buffer is the final fragment.
            let line = buffer.trim();
            if !line.is_empty() {
                if let Ok(fragment) = serde_json::from_str::<GenerateChunk>(line) {
                    if let Some(content) = fragment.response {
                        yield StreamEvent::content(content);
                    }
                    if fragment.done {
                        yield StreamEvent::done();
                    }
                }
            }
        }
    }

    /// Probe the backend's model listing endpoint
    pub async fn check_health(&self) -> Result<BackendHealth, LlmError> {
        let response = self
            .client
            .get(self.api_url("/tags"))
            .timeout(self.config.health_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::BadStatus(status.as_u16()));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(BackendHealth {
            models_available: tags.models.len(),
        })
    }

    /// Proxy the backend's model listing verbatim
    pub async fn list_models(&self) -> Result<serde_json::Value, LlmError> {
        let response = self
            .client
            .get(self.api_url("/tags"))
            .timeout(self.config.models_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::BadStatus(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn options(&self, with_stop: bool) -> GenerateOptions {
        GenerateOptions {
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            repeat_penalty: self.config.repeat_penalty,
            num_predict: self.config.num_predict,
            stop: with_stop.then(stop_sequences),
        }
    }
}

// Backend API types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// One NDJSON fragment of a streamed generation
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_wire_shapes() {
        let content = serde_json::to_string(&StreamEvent::content("hi")).unwrap();
        assert_eq!(content, r#"{"content":"hi"}"#);

        let done = serde_json::to_string(&StreamEvent::done()).unwrap();
        assert_eq!(done, r#"{"done":true}"#);

        let error = serde_json::to_string(&StreamEvent::error("backend error")).unwrap();
        assert_eq!(error, r#"{"error":"backend error"}"#);
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(request.category, "general");
        assert!(request.chat_id.is_none());
    }

    #[test]
    fn test_stop_sequences_only_on_blocking_call() {
        let gateway = InferenceGateway::new(GatewayConfig::default()).unwrap();
        assert!(gateway.options(true).stop.is_some());
        assert!(gateway.options(false).stop.is_none());
    }

    #[test]
    fn test_generate_chunk_tolerates_missing_fields() {
        let done_only: GenerateChunk = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(done_only.response.is_none());
        assert!(done_only.done);

        let content_only: GenerateChunk = serde_json::from_str(r#"{"response":"a"}"#).unwrap();
        assert_eq!(content_only.response.as_deref(), Some("a"));
        assert!(!content_only.done);
    }
}
