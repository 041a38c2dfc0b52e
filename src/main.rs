use anyhow::{anyhow, Context, Result};
use mentris::integration::{AppConfig, TaskDispatcher};
use mentris::llm::OllamaClient;
use mentris::speech::{DisabledOutput, SpeechCapture, SpeechOutput, UnavailableCapture};
use mentris::ui::{ChatCoordinator, VoiceSettings};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentris=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mentris");

    let config = AppConfig::load()
        .and_then(AppConfig::into_usable)
        .context("loading configuration")?;

    let client = OllamaClient::new(config.llm.clone()).context("creating model client")?;
    match client.has_configured_model() {
        Ok(true) => info!("Model {} is available", config.llm.model_id),
        Ok(false) => warn!(
            "Model {} is not installed on {}; run `ollama pull {}`",
            config.llm.model_id, config.llm.base_url, config.llm.model_id
        ),
        Err(e) => warn!("Could not list models: {}", e),
    }

    let (capture, capture_ready) = build_capture(&config);
    let (output, output_ready) = build_output(&config);

    let dispatcher = TaskDispatcher::new(
        Arc::new(client),
        capture,
        output,
        config.llm.generation_options(),
    );
    let voice = VoiceSettings {
        capture: capture_ready,
        speak_replies: output_ready,
    };
    let chat = ChatCoordinator::new(dispatcher, &config.history, voice);

    mentris::ui::run(chat).map_err(|e| anyhow!("GUI error: {}", e))
}

#[cfg(all(feature = "audio-io", feature = "whisper"))]
fn build_capture(config: &AppConfig) -> (Arc<dyn SpeechCapture>, bool) {
    use mentris::speech::MicrophoneCapture;

    if !config.enable_voice_input {
        return (Arc::new(UnavailableCapture::new("Voice input is disabled")), false);
    }
    match MicrophoneCapture::new(config.stt.clone()) {
        Ok(capture) => (Arc::new(capture), true),
        Err(e) => {
            warn!("Voice input unavailable: {}", e);
            (Arc::new(UnavailableCapture::new(e.to_string())), false)
        }
    }
}

#[cfg(not(all(feature = "audio-io", feature = "whisper")))]
fn build_capture(config: &AppConfig) -> (Arc<dyn SpeechCapture>, bool) {
    if config.enable_voice_input {
        info!("Built without the `whisper` feature; voice input unavailable");
    }
    (
        Arc::new(UnavailableCapture::new("Speech recognition is not compiled in")),
        false,
    )
}

#[cfg(all(feature = "audio-io", feature = "sherpa"))]
fn build_output(config: &AppConfig) -> (Arc<dyn SpeechOutput>, bool) {
    use mentris::speech::SherpaSpeaker;

    if !config.enable_voice_output {
        return (Arc::new(DisabledOutput), false);
    }
    match SherpaSpeaker::new(&config.tts) {
        Ok(speaker) => (Arc::new(speaker), true),
        Err(e) => {
            warn!("Speech output unavailable: {}", e);
            (Arc::new(DisabledOutput), false)
        }
    }
}

#[cfg(not(all(feature = "audio-io", feature = "sherpa")))]
fn build_output(config: &AppConfig) -> (Arc<dyn SpeechOutput>, bool) {
    if config.enable_voice_output {
        info!("Built without the `sherpa` feature; replies will not be spoken");
    }
    (Arc::new(DisabledOutput), false)
}
