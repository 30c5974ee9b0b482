//! HTTP Endpoints
//!
//! REST API for chat relaying, speech, audio artifacts, and history.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

use chronicle_llm::{ChatRequest, ChatResponse};
use chronicle_persistence::TurnRole;
use chronicle_speech::{SpeechError, Transcription};

use crate::state::AppState;
use crate::ApiError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/transcribe", post(transcribe))
        .route("/api/synthesize", post(synthesize))
        .route("/api/audio/:filename", delete(delete_audio))
        .route("/api/models", get(models))
        .route("/api/stats", get(stats))
        .route("/api/history", get(history))
        .route("/api/sessions", get(sessions))
        .route("/api/sessions/:id/messages", get(session_messages))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Only browser origins on the configured local dev hosts are permitted.
/// Credentials are allowed, which rules out wildcards, so headers are
/// mirrored from the request instead.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Service banner
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "chronicle API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "features": ["chat", "chat streaming", "speech-to-text", "text-to-speech"],
        "endpoints": ["/api/chat", "/api/chat/stream", "/api/transcribe", "/api/synthesize", "/health"],
    }))
}

/// Aggregated health of the service and its collaborators
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut status = "healthy";

    let inference = match state.gateway.check_health().await {
        Ok(backend) => serde_json::json!({
            "status": "connected",
            "models_available": backend.models_available,
            "current_model": state.gateway.model_name(),
        }),
        Err(err) => {
            status = "degraded";
            serde_json::json!({
                "status": "disconnected",
                "error": err.to_string(),
            })
        }
    };

    Json(serde_json::json!({
        "status": status,
        "timestamp": Utc::now(),
        "services": {
            "inference": inference,
            "transcription": {
                "status": if state.transcriber.is_loaded() { "loaded" } else { "not_loaded" },
            },
            "synthesis": {
                "status": if state.synthesizer.is_loaded() { "loaded" } else { "not_loaded" },
            },
        },
    }))
}

/// Blocking chat exchange
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = request.chat_id.as_deref();

    // History must not take the chat path down with it
    if let Err(err) = state
        .store
        .append(session, TurnRole::User, &request.message)
        .await
    {
        tracing::warn!(error = %err, "failed to persist user turn");
    }

    let response = state.gateway.generate(&request).await?;

    if let Err(err) = state
        .store
        .append(session, TurnRole::Assistant, &response.response)
        .await
    {
        tracing::warn!(error = %err, "failed to persist assistant turn");
    }

    Ok(Json(response))
}

/// Streaming chat relay
///
/// Once the first frame is written the headers are committed, so failures
/// from that point on arrive as terminal in-stream events rather than as
/// an HTTP error.
async fn chat_stream(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let frames = state.gateway.generate_stream(&request).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, std::convert::Infallible>(format!("data: {}\n\n", payload))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Transcribe a multipart audio upload
async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Transcription>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| SpeechError::InvalidInput(e.to_string()))?
        .ok_or_else(|| SpeechError::InvalidInput("missing audio upload".to_string()))?;

    let content_type = field.content_type().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| SpeechError::InvalidInput(e.to_string()))?;

    let result = state
        .transcriber
        .transcribe(content_type.as_deref(), &bytes)
        .await?;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct SynthesizeRequest {
    text: String,
    #[serde(default)]
    voice: Option<String>,
}

/// Synthesize speech and return the WAV as an attachment
async fn synthesize(
    State(state): State<AppState>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let artifact = state
        .synthesizer
        .synthesize(&request.text, request.voice.as_deref())
        .await?;

    let bytes = tokio::fs::read(&artifact.path)
        .await
        .map_err(SpeechError::from)?;

    let disposition = format!("attachment; filename={}", artifact.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Delete a generated audio file by name
async fn delete_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.audio.delete_by_name(&filename).await?;
    Ok(Json(serde_json::json!({ "message": "File deleted successfully" })))
}

/// Proxy the inference backend's model listing
async fn models(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.gateway.list_models().await?))
}

/// Audio artifact counts and local engine load status
async fn stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let audio = state.audio.stats().await?;

    Ok(Json(serde_json::json!({
        "audio_files_count": audio.files,
        "audio_directory_size_mb": audio.total_bytes as f64 / (1024.0 * 1024.0),
        "transcription_loaded": state.transcriber.is_loaded(),
        "synthesis_loaded": state.synthesizer.is_loaded(),
    })))
}

/// Full chat history, oldest first
async fn history(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let turns = state.store.list_all().await?;
    Ok(Json(serde_json::json!({ "messages": turns })))
}

/// Session identifiers present in the history
async fn sessions(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state.store.list_sessions().await?;
    Ok(Json(serde_json::json!({ "sessions": sessions })))
}

/// History of one session
async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let turns = state.store.list_by_session(&id).await?;
    Ok(Json(serde_json::json!({ "session_id": id, "messages": turns })))
}
