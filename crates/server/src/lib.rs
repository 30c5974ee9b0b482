//! chronicle HTTP server
//!
//! REST surface composing the inference gateway, the speech adapters, the
//! audio lifecycle manager, and the message store.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use chronicle_llm::LlmError;
use chronicle_persistence::StoreError;
use chronicle_speech::SpeechError;

/// API-boundary error
///
/// Every failure is translated into an HTTP status plus a JSON message;
/// nothing crashes the process.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Llm(LlmError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Llm(LlmError::Unreachable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Llm(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Speech(SpeechError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Speech(SpeechError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Speech(SpeechError::ModelUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Speech(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
