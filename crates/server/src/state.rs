//! Application state
//!
//! Explicitly owned service handles shared across handlers. Engines are
//! lazily initialized behind their adapters rather than living in ambient
//! globals.

use std::sync::Arc;

use chronicle_config::Settings;
use chronicle_llm::InferenceGateway;
use chronicle_persistence::MessageStore;
use chronicle_speech::{AudioStore, Synthesizer, Transcriber};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub gateway: Arc<InferenceGateway>,
    pub transcriber: Arc<Transcriber>,
    pub synthesizer: Arc<Synthesizer>,
    pub audio: Arc<AudioStore>,
    pub store: Arc<MessageStore>,
}
