//! chronicle server entry point

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use chronicle_config::{load_settings, Settings};
use chronicle_llm::{GatewayConfig, InferenceGateway};
use chronicle_persistence::MessageStore;
use chronicle_server::{create_router, AppState};
use chronicle_speech::{
    AudioStore, EspeakEngine, SynthesisOptions, Synthesizer, Transcriber, WhisperCliEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("CHRONICLE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not initialized yet
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting chronicle server v{}", env!("CARGO_PKG_VERSION"));

    let gateway = Arc::new(InferenceGateway::new(GatewayConfig {
        endpoint: config.inference.endpoint.clone(),
        model: config.inference.model.clone(),
        chat_timeout: Duration::from_secs(config.inference.chat_timeout_secs),
        health_timeout: Duration::from_secs(config.inference.health_timeout_secs),
        models_timeout: Duration::from_secs(config.inference.models_timeout_secs),
        temperature: config.inference.temperature,
        top_p: config.inference.top_p,
        top_k: config.inference.top_k,
        repeat_penalty: config.inference.repeat_penalty,
        num_predict: config.inference.num_predict,
    })?);
    tracing::info!(
        endpoint = %config.inference.endpoint,
        model = %config.inference.model,
        "inference gateway ready"
    );

    let transcriber = Arc::new(Transcriber::new(Arc::new(WhisperCliEngine::new(
        &config.speech.stt_binary,
        &config.speech.stt_model,
    ))));

    let synthesizer = Arc::new(Synthesizer::new(
        Arc::new(EspeakEngine::new(
            &config.speech.tts_binary,
            &config.speech.tts_voice,
        )),
        &config.speech.audio_dir,
        SynthesisOptions {
            max_text_chars: config.speech.max_text_chars,
            timeout: Duration::from_secs(config.speech.synthesis_timeout_secs),
        },
    ));

    let audio = Arc::new(AudioStore::new(
        &config.speech.audio_dir,
        Duration::from_secs(config.speech.retention_secs),
    ));
    audio.ensure_dir().await?;
    tracing::info!(dir = %audio.dir().display(), "audio directory ready");

    let store = Arc::new(MessageStore::connect(&config.persistence.database_url).await?);
    tracing::info!(url = %config.persistence.database_url, "message store ready");

    // The only background activity: periodic reclamation of old audio
    let _sweeper = audio
        .clone()
        .spawn_sweeper(Duration::from_secs(config.speech.sweep_interval_secs));

    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));

    let state = AppState {
        config: Arc::new(config),
        gateway,
        transcriber,
        synthesizer,
        audio,
        store,
    };
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing from the observability config
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},tower_http=info", config.observability.log_level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
