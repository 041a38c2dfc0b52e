//! Microphone listen-and-transcribe
//!
//! A capture is one blocking call: calibrate against the room noise, wait
//! for a phrase, stop at the trailing silence, transcribe. The energy logic
//! lives in [`PhraseDetector`] so it can be driven without a device.

use crate::audio::rms;
use crate::{MentrisError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Blocking speech-to-text source used by voice-capture tasks
pub trait SpeechCapture: Send + Sync {
    /// Listen for one phrase and return its transcription.
    ///
    /// Fails with `NoSpeechRecognized` when nothing intelligible was said,
    /// and with `RecognitionServiceError` when the device or engine fails.
    fn capture(&self) -> Result<String>;
}

/// Settings for microphone capture and transcription
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Path to the ggml whisper model
    pub model_path: PathBuf,

    /// Recognition language
    pub language: String,

    pub n_threads: i32,

    /// Ambient-noise sampling before listening starts
    pub calibration_secs: f32,

    /// Trailing silence that ends a phrase
    pub silence_secs: f32,

    /// Give up when no phrase starts within this time
    pub listen_timeout_secs: Option<f32>,

    /// Cut a phrase off after this long
    pub phrase_limit_secs: Option<f32>,

    /// Speech threshold as a multiple of the ambient level
    pub energy_multiplier: f32,

    /// Lowest speech threshold, for very quiet rooms
    pub min_energy: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: "pt".to_string(),
            n_threads: 4,
            calibration_secs: 0.5,
            silence_secs: 0.8,
            listen_timeout_secs: Some(10.0),
            phrase_limit_secs: None,
            energy_multiplier: 1.5,
            min_energy: 0.01,
        }
    }
}

impl CaptureConfig {
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_listen_timeout(mut self, secs: Option<f32>) -> Self {
        self.listen_timeout_secs = secs;
        self
    }

    pub fn with_phrase_limit(mut self, secs: Option<f32>) -> Self {
        self.phrase_limit_secs = secs;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.calibration_secs < 0.0 || self.silence_secs <= 0.0 {
            return Err("Capture durations must be positive".to_string());
        }
        if self.energy_multiplier <= 0.0 {
            return Err("Energy multiplier must be positive".to_string());
        }
        if self.language.trim().is_empty() {
            return Err("Recognition language is required".to_string());
        }
        Ok(())
    }
}

/// What the detector concluded after a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    Calibrating,
    Waiting,
    InPhrase,
    /// Phrase ended by trailing silence or the phrase limit
    Finished,
    /// No phrase started before the listen timeout
    TimedOut,
}

/// Energy-based end-of-phrase detection over mono blocks
pub struct PhraseDetector {
    sample_rate: u32,
    state: DetectorState,
    calibration_left: usize,
    ambient_sum_sq: f64,
    ambient_count: usize,
    threshold: f32,
    energy_multiplier: f32,
    min_energy: f32,
    silence_limit: usize,
    silence_run: usize,
    timeout: Option<usize>,
    waited: usize,
    phrase_limit: Option<usize>,
    phrase: Vec<f32>,
}

impl PhraseDetector {
    pub fn new(config: &CaptureConfig, sample_rate: u32) -> Self {
        let samples = |secs: f32| (secs.max(0.0) * sample_rate as f32).round() as usize;
        let calibration_left = samples(config.calibration_secs);

        Self {
            sample_rate,
            state: if calibration_left > 0 {
                DetectorState::Calibrating
            } else {
                DetectorState::Waiting
            },
            calibration_left,
            ambient_sum_sq: 0.0,
            ambient_count: 0,
            threshold: config.min_energy,
            energy_multiplier: config.energy_multiplier,
            min_energy: config.min_energy,
            silence_limit: samples(config.silence_secs).max(1),
            silence_run: 0,
            timeout: config.listen_timeout_secs.map(samples),
            waited: 0,
            phrase_limit: config.phrase_limit_secs.map(samples),
            phrase: Vec::new(),
        }
    }

    /// Feed one block and return the resulting state
    pub fn push(&mut self, block: &[f32]) -> DetectorState {
        let mut block = block;

        if self.state == DetectorState::Calibrating {
            let take = block.len().min(self.calibration_left);
            let (ambient, rest) = block.split_at(take);
            self.ambient_sum_sq += ambient.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
            self.ambient_count += ambient.len();
            self.calibration_left -= take;

            if self.calibration_left == 0 {
                self.finish_calibration();
            }
            block = rest;
        }

        if block.is_empty() {
            return self.state;
        }

        let loud = rms(block) > self.threshold;

        match self.state {
            DetectorState::Waiting => {
                if loud {
                    debug!("Phrase started");
                    self.state = DetectorState::InPhrase;
                    self.phrase.extend_from_slice(block);
                } else {
                    self.waited += block.len();
                    if self.timeout.is_some_and(|limit| self.waited >= limit) {
                        self.state = DetectorState::TimedOut;
                    }
                }
            }
            DetectorState::InPhrase => {
                self.phrase.extend_from_slice(block);
                if loud {
                    self.silence_run = 0;
                } else {
                    self.silence_run += block.len();
                }

                let over_limit = self.phrase_limit.is_some_and(|limit| self.phrase.len() >= limit);
                if self.silence_run >= self.silence_limit || over_limit {
                    debug!(
                        "Phrase finished after {:.2}s",
                        self.phrase.len() as f32 / self.sample_rate as f32
                    );
                    self.state = DetectorState::Finished;
                }
            }
            _ => {}
        }

        self.state
    }

    fn finish_calibration(&mut self) {
        let ambient = if self.ambient_count == 0 {
            0.0
        } else {
            (self.ambient_sum_sq / self.ambient_count as f64).sqrt() as f32
        };
        self.threshold = (ambient * self.energy_multiplier).max(self.min_energy);
        self.state = DetectorState::Waiting;
        debug!("Ambient level {:.4}, speech threshold {:.4}", ambient, self.threshold);
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Captured phrase audio, including its trailing silence
    pub fn into_phrase(self) -> Vec<f32> {
        self.phrase
    }
}

/// Whisper annotations that stand for "nothing was said"
fn is_non_speech(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || matches!(
            trimmed,
            "[BLANK_AUDIO]" | "[SILENCE]" | "(silence)" | "[Música]" | "[MUSIC]" | "..."
        )
}

/// Turn raw transcription output into the recognized text
pub fn clean_transcript(text: &str) -> Result<String> {
    if is_non_speech(text) {
        return Err(MentrisError::NoSpeechRecognized);
    }
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Stand-in used when the build or configuration has no recognizer
pub struct UnavailableCapture {
    reason: String,
}

impl UnavailableCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechCapture for UnavailableCapture {
    fn capture(&self) -> Result<String> {
        Err(MentrisError::RecognitionServiceError(self.reason.clone()))
    }
}

#[cfg(feature = "whisper")]
pub use whisper_backend::WhisperTranscriber;

#[cfg(feature = "whisper")]
mod whisper_backend {
    use super::clean_transcript;
    use crate::{MentrisError, Result};
    use std::path::Path;
    use tracing::{debug, info};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper model loaded once and shared across captures
    pub struct WhisperTranscriber {
        context: WhisperContext,
        language: String,
        n_threads: i32,
    }

    impl WhisperTranscriber {
        pub fn load(model_path: &Path, language: &str, n_threads: i32) -> Result<Self> {
            info!("Loading Whisper model from: {:?}", model_path);

            if !model_path.exists() {
                return Err(MentrisError::ModelLoadError(format!(
                    "Model file not found: {:?}",
                    model_path
                )));
            }

            let path = model_path
                .to_str()
                .ok_or_else(|| MentrisError::ModelLoadError("Invalid model path".to_string()))?;

            let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| {
                    MentrisError::ModelLoadError(format!("Failed to load Whisper model: {:?}", e))
                })?;

            Ok(Self {
                context,
                language: language.to_string(),
                n_threads,
            })
        }

        /// Transcribe 16 kHz mono audio
        pub fn transcribe(&self, samples: &[f32]) -> Result<String> {
            if samples.is_empty() {
                return Err(MentrisError::NoSpeechRecognized);
            }

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_n_threads(self.n_threads);
            params.set_translate(false);
            params.set_language(Some(&self.language));
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            let service = |what: &str, e: whisper_rs::WhisperError| {
                MentrisError::RecognitionServiceError(format!("{}: {:?}", what, e))
            };

            let mut state = self
                .context
                .create_state()
                .map_err(|e| service("Failed to create state", e))?;
            state
                .full(params, samples)
                .map_err(|e| service("Transcription failed", e))?;

            let segments = state
                .full_n_segments()
                .map_err(|e| service("Failed to get segments", e))?;

            let mut text = String::new();
            for i in 0..segments {
                let segment = state
                    .full_get_segment_text(i)
                    .map_err(|e| service("Failed to get segment text", e))?;
                text.push_str(&segment);
            }

            debug!("Whisper output: '{}'", text.trim());
            clean_transcript(&text)
        }
    }
}

#[cfg(all(feature = "audio-io", feature = "whisper"))]
pub use microphone::MicrophoneCapture;

#[cfg(all(feature = "audio-io", feature = "whisper"))]
mod microphone {
    use super::{CaptureConfig, DetectorState, PhraseDetector, SpeechCapture, WhisperTranscriber};
    use crate::audio::{prepare_for_transcription, AudioInput};
    use crate::{MentrisError, Result};
    use crossbeam_channel::{bounded, RecvTimeoutError};
    use std::time::Duration;
    use tracing::{debug, info};

    /// Longest gap between device blocks before the capture is abandoned
    const DEVICE_STALL: Duration = Duration::from_secs(2);

    /// Default microphone plus whisper
    pub struct MicrophoneCapture {
        config: CaptureConfig,
        transcriber: WhisperTranscriber,
    }

    impl MicrophoneCapture {
        pub fn new(config: CaptureConfig) -> Result<Self> {
            let transcriber =
                WhisperTranscriber::load(&config.model_path, &config.language, config.n_threads)?;
            Ok(Self {
                config,
                transcriber,
            })
        }

        fn record_phrase(&self) -> Result<(Vec<f32>, u32)> {
            let device_error = |e: MentrisError| MentrisError::RecognitionServiceError(e.to_string());

            let mut input = AudioInput::open_default().map_err(device_error)?;
            let sample_rate = input.sample_rate();
            let (tx, rx) = bounded(64);
            input.start(tx).map_err(device_error)?;

            let mut detector = PhraseDetector::new(&self.config, sample_rate);
            info!("Listening");

            loop {
                match rx.recv_timeout(DEVICE_STALL) {
                    Ok(block) => match detector.push(&block) {
                        DetectorState::Finished => break,
                        DetectorState::TimedOut => {
                            debug!("No phrase before the listen timeout");
                            return Err(MentrisError::NoSpeechRecognized);
                        }
                        _ => {}
                    },
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(MentrisError::RecognitionServiceError(
                            "Microphone stopped delivering audio".to_string(),
                        ));
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(MentrisError::RecognitionServiceError(
                            "Microphone stream closed".to_string(),
                        ));
                    }
                }
            }

            input.stop();
            Ok((detector.into_phrase(), sample_rate))
        }
    }

    impl SpeechCapture for MicrophoneCapture {
        fn capture(&self) -> Result<String> {
            let (phrase, sample_rate) = self.record_phrase()?;
            let prepared = prepare_for_transcription(&phrase, sample_rate)?;
            let text = self.transcriber.transcribe(&prepared)?;
            info!("Recognized: {}", text);
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn tone(len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.3).sin() * amplitude)
            .collect()
    }

    fn config() -> CaptureConfig {
        CaptureConfig::default()
            .with_listen_timeout(Some(2.0))
            .with_phrase_limit(None)
    }

    #[test]
    fn test_calibration_sets_threshold() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        assert_eq!(detector.state(), DetectorState::Calibrating);

        // Loud room: threshold follows the ambient level
        let state = detector.push(&tone(8000, 0.1));
        assert_eq!(state, DetectorState::Waiting);
        assert!(detector.threshold() > 0.07 && detector.threshold() < 0.15);
    }

    #[test]
    fn test_quiet_room_uses_floor() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        detector.push(&vec![0.0; 8000]);
        assert_eq!(detector.threshold(), 0.01);
    }

    #[test]
    fn test_phrase_ends_on_trailing_silence() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        detector.push(&tone(8000, 0.001));

        assert_eq!(detector.push(&tone(1600, 0.5)), DetectorState::InPhrase);
        assert_eq!(detector.push(&tone(1600, 0.5)), DetectorState::InPhrase);

        // 0.8 s of silence in 0.1 s blocks
        let mut state = DetectorState::InPhrase;
        for _ in 0..8 {
            state = detector.push(&vec![0.0; 1600]);
        }
        assert_eq!(state, DetectorState::Finished);
        assert_eq!(detector.into_phrase().len(), 1600 * 10);
    }

    #[test]
    fn test_short_pause_does_not_end_phrase() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        detector.push(&tone(8000, 0.001));
        detector.push(&tone(1600, 0.5));
        detector.push(&vec![0.0; 1600 * 4]);
        assert_eq!(detector.push(&tone(1600, 0.5)), DetectorState::InPhrase);
    }

    #[test]
    fn test_times_out_without_speech() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        detector.push(&vec![0.0; 8000]);
        let mut state = DetectorState::Waiting;
        for _ in 0..20 {
            state = detector.push(&vec![0.0; 1600]);
        }
        assert_eq!(state, DetectorState::TimedOut);
    }

    #[test]
    fn test_phrase_limit() {
        let config = config().with_phrase_limit(Some(0.5));
        let mut detector = PhraseDetector::new(&config, RATE);
        detector.push(&vec![0.0; 8000]);
        let mut state = DetectorState::Waiting;
        for _ in 0..5 {
            state = detector.push(&tone(1600, 0.5));
        }
        assert_eq!(state, DetectorState::Finished);
    }

    #[test]
    fn test_calibration_split_across_block() {
        let mut detector = PhraseDetector::new(&config(), RATE);
        let mut block = vec![0.0; 8000];
        block.extend(tone(1600, 0.5));
        assert_eq!(detector.push(&block), DetectorState::InPhrase);
    }

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript("  olá   mundo \n").unwrap(), "olá mundo");
        assert_eq!(clean_transcript(" [BLANK_AUDIO] "), Err(MentrisError::NoSpeechRecognized));
        assert_eq!(clean_transcript(""), Err(MentrisError::NoSpeechRecognized));
    }

    #[test]
    fn test_unavailable_capture_fails() {
        let capture = UnavailableCapture::new("no recognizer");
        assert!(matches!(
            capture.capture(),
            Err(MentrisError::RecognitionServiceError(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(CaptureConfig::default().validate().is_ok());
        assert!(CaptureConfig::default().with_language("").validate().is_err());
    }
}
