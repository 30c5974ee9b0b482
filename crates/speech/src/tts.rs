//! Text-to-Speech adapter
//!
//! Text-in/audio-file-out contract over the synthesis engine, with a
//! bounded-time execution guard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::engine::TtsEngine;
use crate::SpeechError;

/// Bounds applied to each synthesis call
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Maximum text length, in characters
    pub max_text_chars: usize,
    /// Wall-clock bound on one synthesis call
    pub timeout: Duration,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_text_chars: 1000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Synthesized audio artifact on disk
#[derive(Debug, Clone, Serialize)]
pub struct AudioArtifact {
    pub filename: String,
    pub path: PathBuf,
}

/// Shared synthesis adapter
///
/// Engine initialization is not safe to run concurrently; the init cell
/// serializes first use. Preparation failures are retried on the next
/// call.
pub struct Synthesizer {
    engine: Arc<dyn TtsEngine>,
    audio_dir: PathBuf,
    options: SynthesisOptions,
    ready: OnceCell<()>,
}

impl Synthesizer {
    pub fn new(
        engine: Arc<dyn TtsEngine>,
        audio_dir: impl Into<PathBuf>,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            engine,
            audio_dir: audio_dir.into(),
            options,
            ready: OnceCell::new(),
        }
    }

    /// Whether the engine finished its one-time preparation
    pub fn is_loaded(&self) -> bool {
        self.ready.initialized()
    }

    /// Synthesize `text` into a uniquely named WAV file in the audio dir
    ///
    /// Bounded by the configured wall-clock timeout. On timeout the worker
    /// is abandoned and the call fails; a subprocess engine terminates its
    /// child when the abandoned future is dropped, a library engine would
    /// keep running until it finishes on its own.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<AudioArtifact, SpeechError> {
        if text.chars().count() > self.options.max_text_chars {
            return Err(SpeechError::InvalidInput(format!(
                "text too long (max {} characters)",
                self.options.max_text_chars
            )));
        }

        self.ready
            .get_or_try_init(|| self.engine.prepare())
            .await?;

        let filename = unique_filename(Utc::now());
        let path = self.audio_dir.join(&filename);

        let bounded = tokio::time::timeout(
            self.options.timeout,
            self.engine
                .synthesize(text, voice.unwrap_or("default"), &path),
        );

        match bounded.await {
            Err(_) => {
                tracing::warn!(
                    filename = %filename,
                    timeout_secs = self.options.timeout.as_secs(),
                    "synthesis exceeded its time bound, abandoning worker"
                );
                Err(SpeechError::Timeout)
            }
            Ok(Err(err)) => Err(err),
            Ok(Ok(())) => {
                verify_wav(&path)?;
                tracing::debug!(filename = %filename, "synthesis complete");
                Ok(AudioArtifact { filename, path })
            }
        }
    }
}

/// Timestamp-derived unique name; second granularity is sufficient for the
/// expected request rate.
fn unique_filename(now: DateTime<Utc>) -> String {
    format!("chronicle_tts_{}.wav", now.format("%Y%m%d_%H%M%S"))
}

/// The engine may report success while producing no (or a truncated)
/// file; reject anything that cannot be opened as WAV.
fn verify_wav(path: &Path) -> Result<(), SpeechError> {
    hound::WavReader::open(path)
        .map(|_| ())
        .map_err(|e| SpeechError::Synthesis(format!("engine produced no readable output: {}", e)))
}
