//! Spoken replies
//!
//! Text is cut at sentence punctuation and each piece is synthesized and
//! played in turn, with a short pause between pieces.

use crate::{MentrisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Speech rate treated as the model's natural speed
pub const NORMAL_RATE_WPM: u32 = 200;

/// Blocking text-to-speech sink used by playback tasks
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, returning once playback has finished
    fn speak(&self, text: &str) -> Result<()>;
}

/// Settings for synthesis and playback
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Default VITS model, used when the preferred voice is not installed
    pub model_path: PathBuf,
    pub tokens_path: PathBuf,
    /// espeak-ng data for piper voices
    pub data_dir: Option<PathBuf>,

    /// Directory holding one sub-directory per installed voice
    pub voices_dir: Option<PathBuf>,
    pub preferred_voice: String,

    pub rate_wpm: u32,
    pub volume: f32,
    pub pause_ms: u64,
    pub speaker_id: i32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/tts/model.onnx"),
            tokens_path: PathBuf::from("models/tts/tokens.txt"),
            data_dir: None,
            voices_dir: Some(PathBuf::from("models/voices")),
            preferred_voice: "Maria".to_string(),
            rate_wpm: NORMAL_RATE_WPM,
            volume: 1.0,
            pause_ms: 200,
            speaker_id: 0,
        }
    }
}

impl SpeechConfig {
    pub fn with_voices_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.voices_dir = Some(dir.into());
        self
    }

    pub fn with_preferred_voice(mut self, name: impl Into<String>) -> Self {
        self.preferred_voice = name.into();
        self
    }

    pub fn with_rate(mut self, rate_wpm: u32) -> Self {
        self.rate_wpm = rate_wpm;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// VITS length scale for the configured rate (1.0 = normal, <1.0 = faster)
    pub fn length_scale(&self) -> f32 {
        let speed = self.rate_wpm as f32 / NORMAL_RATE_WPM as f32;
        1.0 / speed.max(0.1)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.rate_wpm == 0 {
            return Err("Speech rate must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("Volume must be between 0.0 and 1.0: {}", self.volume));
        }
        Ok(())
    }
}

/// Model files for one voice
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceSelection {
    pub name: String,
    pub model_path: PathBuf,
    pub tokens_path: PathBuf,
    pub data_dir: Option<PathBuf>,
}

/// Pick the preferred voice from the voices directory, falling back to the
/// default model. A missing voice is not an error.
pub fn resolve_voice(config: &SpeechConfig) -> VoiceSelection {
    let fallback = VoiceSelection {
        name: "default".to_string(),
        model_path: config.model_path.clone(),
        tokens_path: config.tokens_path.clone(),
        data_dir: config.data_dir.clone(),
    };

    let Some(dir) = config.voices_dir.as_deref() else {
        return fallback;
    };
    let wanted = config.preferred_voice.to_lowercase();
    if wanted.is_empty() {
        return fallback;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No voices directory at {:?}: {}", dir, e);
            return fallback;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    for voice_dir in candidates {
        if let Some(selection) = voice_in(&voice_dir) {
            info!("Using voice '{}' from {:?}", selection.name, voice_dir);
            return selection;
        }
    }

    debug!("Voice '{}' not installed, using default", config.preferred_voice);
    fallback
}

fn voice_in(dir: &Path) -> Option<VoiceSelection> {
    let tokens_path = dir.join("tokens.txt");
    if !tokens_path.is_file() {
        return None;
    }

    let mut models: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "onnx"))
        .collect();
    models.sort();
    let model_path = models.into_iter().next()?;

    let data_dir = dir.join("espeak-ng-data");
    Some(VoiceSelection {
        name: dir.file_name()?.to_string_lossy().into_owned(),
        model_path,
        tokens_path,
        data_dir: data_dir.is_dir().then_some(data_dir),
    })
}

/// Cut text into speakable sentences.
///
/// `...`, `!` and `?` count as sentence ends like `.`; pieces are trimmed and
/// empty ones dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.replace("...", ".")
        .replace(['!', '?'], ".")
        .split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop the markdown the model likes to emit, which synthesizers read aloud
pub fn strip_markup(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches(['#', '>', '-']).trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['*', '`', '_'], "")
}

/// Run `speak_segment` on each sentence of `text` with `pause` between them.
///
/// Stops at the first failure. Returns the number of segments spoken.
pub fn speak_in_segments<F>(text: &str, pause: Duration, mut speak_segment: F) -> Result<usize>
where
    F: FnMut(&str) -> Result<()>,
{
    let segments = split_sentences(&strip_markup(text));
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        debug!("Speaking segment {}: {}", i, segment);
        speak_segment(segment)?;
    }
    Ok(segments.len())
}

/// Sink used when speech output is turned off or unavailable
pub struct DisabledOutput;

impl SpeechOutput for DisabledOutput {
    fn speak(&self, text: &str) -> Result<()> {
        debug!("Speech output disabled, skipping {} chars", text.len());
        Ok(())
    }
}

#[cfg(all(feature = "sherpa", feature = "audio-io"))]
pub use sherpa_backend::SherpaSpeaker;

#[cfg(all(feature = "sherpa", feature = "audio-io"))]
mod sherpa_backend {
    use super::{resolve_voice, speak_in_segments, SpeechConfig, SpeechOutput};
    use crate::audio::AudioOutput;
    use crate::{MentrisError, Result};
    use parking_lot::Mutex;
    use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
    use std::time::Duration;
    use tracing::info;

    /// VITS synthesis through sherpa-rs, played on the default speaker
    pub struct SherpaSpeaker {
        tts: Mutex<VitsTts>,
        speaker_id: i32,
        volume: f32,
        pause: Duration,
    }

    impl SherpaSpeaker {
        pub fn new(config: &SpeechConfig) -> Result<Self> {
            let voice = resolve_voice(config);

            if !voice.model_path.exists() {
                return Err(MentrisError::ModelLoadError(format!(
                    "TTS model not found: {:?}",
                    voice.model_path
                )));
            }
            if !voice.tokens_path.exists() {
                return Err(MentrisError::ModelLoadError(format!(
                    "Tokens file not found: {:?}",
                    voice.tokens_path
                )));
            }

            info!("Loading VITS voice '{}' from {:?}", voice.name, voice.model_path);

            let vits_config = VitsTtsConfig {
                model: voice.model_path.to_string_lossy().into_owned(),
                tokens: voice.tokens_path.to_string_lossy().into_owned(),
                data_dir: voice
                    .data_dir
                    .map(|dir| dir.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                length_scale: config.length_scale(),
                ..Default::default()
            };

            Ok(Self {
                tts: Mutex::new(VitsTts::new(vits_config)),
                speaker_id: config.speaker_id,
                volume: config.volume,
                pause: config.pause(),
            })
        }
    }

    impl SpeechOutput for SherpaSpeaker {
        fn speak(&self, text: &str) -> Result<()> {
            let output = AudioOutput::open_default()
                .map_err(|e| MentrisError::SynthesisError(e.to_string()))?;

            let spoken = speak_in_segments(text, self.pause, |segment| {
                let audio = self
                    .tts
                    .lock()
                    .create(segment, self.speaker_id, 1.0)
                    .map_err(|e| MentrisError::SynthesisError(format!("Synthesis failed: {}", e)))?;

                output
                    .play_blocking(&audio.samples, audio.sample_rate as u32, self.volume)
                    .map_err(|e| MentrisError::SynthesisError(e.to_string()))
            })?;

            info!("Spoke {} segments", spoken);
            Ok(())
        }
    }
}

/// Speak through `output`, logging instead of failing for empty text
pub fn speak_response(output: &dyn SpeechOutput, text: &str) -> Result<()> {
    if split_sentences(text).is_empty() {
        warn!("Nothing to speak");
        return Ok(());
    }
    output.speak(text).map_err(|e| match e {
        MentrisError::SynthesisError(_) => e,
        other => MentrisError::SynthesisError(other.to_string()),
    })
}
