//! Speech-to-Text adapter
//!
//! File-in/text-out contract over the transcription engine.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::engine::SttEngine;
use crate::SpeechError;

/// Language reported when the engine does not detect one
const DEFAULT_LANGUAGE: &str = "en";

/// Transcription result returned to the API
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub transcription: String,
    pub confidence: f32,
    pub language: String,
}

/// Shared transcription adapter
///
/// The engine is expensive to construct, so preparation runs once on
/// first use; a failed preparation is retried on the next call instead of
/// poisoning the adapter.
pub struct Transcriber {
    engine: Arc<dyn SttEngine>,
    ready: OnceCell<()>,
}

impl Transcriber {
    pub fn new(engine: Arc<dyn SttEngine>) -> Self {
        Self {
            engine,
            ready: OnceCell::new(),
        }
    }

    /// Whether the engine finished its one-time preparation
    pub fn is_loaded(&self) -> bool {
        self.ready.initialized()
    }

    /// Transcribe an uploaded audio payload
    ///
    /// The payload must declare an audio content type. Bytes are staged in
    /// a scoped temporary file; dropping it removes the file on every exit
    /// path, success or failure.
    pub async fn transcribe(
        &self,
        content_type: Option<&str>,
        audio: &[u8],
    ) -> Result<Transcription, SpeechError> {
        let declared = content_type.unwrap_or_default();
        if !declared.starts_with("audio/") {
            return Err(SpeechError::InvalidInput(
                "file must be an audio file".to_string(),
            ));
        }

        self.ready
            .get_or_try_init(|| self.engine.prepare())
            .await?;

        let temp = {
            let audio = audio.to_vec();
            tokio::task::spawn_blocking(
                move || -> Result<tempfile::NamedTempFile, std::io::Error> {
                    let mut temp = tempfile::Builder::new().suffix(".wav").tempfile()?;
                    temp.write_all(&audio)?;
                    temp.flush()?;
                    Ok(temp)
                },
            )
            .await
            .map_err(|e| SpeechError::Transcription(e.to_string()))??
        };

        let result = self.engine.transcribe(temp.path()).await?;

        Ok(Transcription {
            transcription: result.text.trim().to_string(),
            confidence: result.confidence.unwrap_or(0.0),
            language: result
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineTranscript;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubEngine {
        calls: AtomicUsize,
        fail_prepare: AtomicBool,
    }

    #[async_trait]
    impl SttEngine for StubEngine {
        async fn prepare(&self) -> Result<(), SpeechError> {
            if self.fail_prepare.load(Ordering::SeqCst) {
                return Err(SpeechError::ModelUnavailable("no model".to_string()));
            }
            Ok(())
        }

        async fn transcribe(&self, input: &Path) -> Result<EngineTranscript, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(input.exists());
            Ok(EngineTranscript {
                text: "  spoken words  ".to_string(),
                confidence: None,
                language: None,
            })
        }
    }

    #[tokio::test]
    async fn test_non_audio_content_type_rejected_before_engine_runs() {
        let engine = Arc::new(StubEngine::default());
        let transcriber = Transcriber::new(engine.clone());

        let err = transcriber
            .transcribe(Some("text/plain"), b"hello")
            .await
            .unwrap_err();

        assert!(matches!(err, SpeechError::InvalidInput(_)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);

        let err = transcriber.transcribe(None, b"hello").await.unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_transcribe_trims_text_and_applies_defaults() {
        let transcriber = Transcriber::new(Arc::new(StubEngine::default()));

        let result = transcriber
            .transcribe(Some("audio/wav"), &[0u8; 64])
            .await
            .unwrap();

        assert_eq!(result.transcription, "spoken words");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.language, "en");
        assert!(transcriber.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_preparation_is_retried_on_next_call() {
        let engine = Arc::new(StubEngine::default());
        engine.fail_prepare.store(true, Ordering::SeqCst);
        let transcriber = Transcriber::new(engine.clone());

        let err = transcriber
            .transcribe(Some("audio/wav"), &[0u8; 8])
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::ModelUnavailable(_)));
        assert!(!transcriber.is_loaded());

        // Engine recovers; the adapter retries instead of staying poisoned
        engine.fail_prepare.store(false, Ordering::SeqCst);
        let result = transcriber
            .transcribe(Some("audio/wav"), &[0u8; 8])
            .await
            .unwrap();
        assert_eq!(result.transcription, "spoken words");
        assert!(transcriber.is_loaded());
    }
}
