//! Speech adapters and audio artifact lifecycle
//!
//! Wraps the transcription and synthesis engines behind trait seams, with
//! lazily initialized shared instances, and manages the generated-audio
//! directory (unique naming, explicit deletion, periodic reclamation).

pub mod audio;
pub mod engine;
pub mod stt;
pub mod tts;

pub use audio::{AudioStats, AudioStore};
pub use engine::{EngineTranscript, EspeakEngine, SttEngine, TtsEngine, WhisperCliEngine};
pub use stt::{Transcriber, Transcription};
pub use tts::{AudioArtifact, SynthesisOptions, Synthesizer};

use thiserror::Error;

/// Speech processing errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Speech engine unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Synthesis timed out")]
    Timeout,

    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
