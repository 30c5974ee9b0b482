//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Inference backend configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Speech engine configuration
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Message store configuration
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins (browser dev hosts)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Inference backend (Ollama-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the inference backend
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,

    /// Model name to generate with
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for generation calls, in seconds
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,

    /// Timeout for the health probe, in seconds
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// Timeout for the model listing proxy, in seconds
    #[serde(default = "default_models_timeout")]
    pub models_timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling threshold
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Repetition penalty
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
}

fn default_inference_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_chat_timeout() -> u64 {
    120
}

fn default_health_timeout() -> u64 {
    5
}

fn default_models_timeout() -> u64 {
    10
}

fn default_temperature() -> f32 {
    0.8
}

fn default_top_p() -> f32 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_num_predict() -> u32 {
    800
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            model: default_model(),
            chat_timeout_secs: default_chat_timeout(),
            health_timeout_secs: default_health_timeout(),
            models_timeout_secs: default_models_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
            num_predict: default_num_predict(),
        }
    }
}

/// Speech engine and audio artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Transcription engine binary (whisper.cpp CLI)
    #[serde(default = "default_stt_binary")]
    pub stt_binary: String,

    /// Transcription model path
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Synthesis engine binary
    #[serde(default = "default_tts_binary")]
    pub tts_binary: String,

    /// Default synthesis voice
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,

    /// Directory for generated audio artifacts
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Maximum synthesizable text length, in characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Wall-clock bound for one synthesis call, in seconds
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Age threshold after which audio artifacts are reclaimed, in seconds
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// Interval between cleanup sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_stt_binary() -> String {
    "whisper-cli".to_string()
}

fn default_stt_model() -> String {
    "models/ggml-base.bin".to_string()
}

fn default_tts_binary() -> String {
    "espeak-ng".to_string()
}

fn default_tts_voice() -> String {
    "default".to_string()
}

fn default_audio_dir() -> String {
    "audio_files".to_string()
}

fn default_max_text_chars() -> usize {
    1000
}

fn default_synthesis_timeout() -> u64 {
    30
}

fn default_retention() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_binary: default_stt_binary(),
            stt_model: default_stt_model(),
            tts_binary: default_tts_binary(),
            tts_voice: default_tts_voice(),
            audio_dir: default_audio_dir(),
            max_text_chars: default_max_text_chars(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Message store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// sqlx-compatible SQLite URL
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    "sqlite://chronicle.db".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "inference.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.inference.temperature),
            });
        }

        if !(0.0..=1.0).contains(&self.inference.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "inference.top_p".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.inference.top_p),
            });
        }

        if self.inference.num_predict == 0 {
            return Err(ConfigError::InvalidValue {
                field: "inference.num_predict".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if self.speech.max_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "speech.max_text_chars".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if self.speech.synthesis_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "speech.synthesis_timeout_secs".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if self.speech.retention_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "speech.retention_secs".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > struct defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CHRONICLE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
