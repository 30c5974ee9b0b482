//! Engine seams
//!
//! The transcription and synthesis engines are opaque local programs
//! invoked once per call. The traits keep the adapters testable and the
//! engines swappable; the concrete implementations wrap the whisper.cpp
//! CLI and espeak-ng.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::SpeechError;

/// Raw engine output for one transcription call
#[derive(Debug, Clone, Default)]
pub struct EngineTranscript {
    pub text: String,
    pub confidence: Option<f32>,
    pub language: Option<String>,
}

/// Speech-to-text engine
#[async_trait]
pub trait SttEngine: Send + Sync {
    /// One-time expensive setup (model verification etc.)
    async fn prepare(&self) -> Result<(), SpeechError>;

    /// Transcribe the audio file at `input`
    async fn transcribe(&self, input: &Path) -> Result<EngineTranscript, SpeechError>;
}

/// Text-to-speech engine
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// One-time expensive setup
    async fn prepare(&self) -> Result<(), SpeechError>;

    /// Synthesize `text` into a WAV file at `output`
    ///
    /// `voice` is an engine voice identifier; `"default"` means the
    /// engine's own default.
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError>;
}

/// whisper.cpp CLI transcription engine
///
/// Runs the binary once per call with JSON output into a scoped temp
/// directory. The CLI reports no overall confidence, so the transcript
/// carries `None` and the adapter applies its default.
pub struct WhisperCliEngine {
    binary: String,
    model: PathBuf,
}

impl WhisperCliEngine {
    pub fn new(binary: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SttEngine for WhisperCliEngine {
    async fn prepare(&self) -> Result<(), SpeechError> {
        if !self.model.exists() {
            return Err(SpeechError::ModelUnavailable(format!(
                "transcription model missing: {}",
                self.model.display()
            )));
        }

        // A spawn failure means the binary itself is absent; the exit code
        // of --help varies across builds and is not checked.
        Command::new(&self.binary)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SpeechError::ModelUnavailable(format!("{}: {}", self.binary, e)))?;

        tracing::info!(binary = %self.binary, model = %self.model.display(), "transcription engine ready");
        Ok(())
    }

    async fn transcribe(&self, input: &Path) -> Result<EngineTranscript, SpeechError> {
        let out_dir = tempfile::tempdir()?;
        let out_base = out_dir.path().join("transcript");

        let output = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(input)
            .arg("-oj")
            .arg("-of")
            .arg(&out_base)
            .arg("--no-prints")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SpeechError::Transcription(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Transcription(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let json_path = out_base.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| SpeechError::Transcription(format!("missing engine output: {}", e)))?;

        Ok(parse_whisper_output(&raw)?)
    }
}

fn parse_whisper_output(raw: &str) -> Result<EngineTranscript, SpeechError> {
    let parsed: WhisperOutput = serde_json::from_str(raw)
        .map_err(|e| SpeechError::Transcription(format!("unparseable engine output: {}", e)))?;

    let text = parsed
        .transcription
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<String>();

    Ok(EngineTranscript {
        text,
        confidence: None,
        language: parsed.result.and_then(|r| r.language),
    })
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
    #[serde(default)]
    result: Option<WhisperResult>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperResult {
    #[serde(default)]
    language: Option<String>,
}

/// espeak-ng synthesis engine
///
/// Text goes in on stdin; the engine writes a RIFF WAV to `output`.
/// `kill_on_drop` terminates the child when a timed-out call is dropped.
pub struct EspeakEngine {
    binary: String,
    default_voice: String,
}

impl EspeakEngine {
    pub fn new(binary: impl Into<String>, default_voice: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            default_voice: default_voice.into(),
        }
    }
}

#[async_trait]
impl TtsEngine for EspeakEngine {
    async fn prepare(&self) -> Result<(), SpeechError> {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SpeechError::ModelUnavailable(format!("{}: {}", self.binary, e)))?;

        if !status.success() {
            return Err(SpeechError::ModelUnavailable(format!(
                "{} exited with {}",
                self.binary, status
            )));
        }

        tracing::info!(binary = %self.binary, "synthesis engine ready");
        Ok(())
    }

    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError> {
        let voice = if voice.is_empty() || voice == "default" {
            self.default_voice.as_str()
        } else {
            voice
        };

        let mut command = Command::new(&self.binary);
        command.arg("--stdin").arg("-w").arg(output);
        if voice != "default" {
            command.arg("-v").arg(voice);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
            // Dropping stdin closes the pipe so the engine sees EOF
        }

        let done = child
            .wait_with_output()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !done.status.success() {
            let stderr = String::from_utf8_lossy(&done.stderr);
            return Err(SpeechError::Synthesis(format!(
                "engine exited with {}: {}",
                done.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_output_concatenates_segments() {
        let raw = r#"{
            "result": {"language": "en"},
            "transcription": [
                {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,000"}, "text": " Hello"},
                {"timestamps": {"from": "00:00:02,000", "to": "00:00:04,000"}, "text": " world."}
            ]
        }"#;

        let transcript = parse_whisper_output(raw).unwrap();
        assert_eq!(transcript.text, " Hello world.");
        assert_eq!(transcript.language.as_deref(), Some("en"));
        assert!(transcript.confidence.is_none());
    }

    #[test]
    fn test_parse_whisper_output_tolerates_missing_result() {
        let transcript = parse_whisper_output(r#"{"transcription": []}"#).unwrap();
        assert_eq!(transcript.text, "");
        assert!(transcript.language.is_none());
    }

    #[test]
    fn test_parse_whisper_output_rejects_garbage() {
        assert!(matches!(
            parse_whisper_output("not json"),
            Err(SpeechError::Transcription(_))
        ));
    }
}
