//! Speech in and out
//!
//! - [`stt`]: one blocking microphone capture transcribed by Whisper
//! - [`tts`]: sentence-by-sentence playback through a VITS voice

pub mod stt;
pub mod tts;

pub use stt::{
    clean_transcript, CaptureConfig, DetectorState, PhraseDetector, SpeechCapture,
    UnavailableCapture,
};
pub use tts::{
    resolve_voice, speak_in_segments, speak_response, split_sentences, strip_markup,
    DisabledOutput, SpeechConfig, SpeechOutput, VoiceSelection, NORMAL_RATE_WPM,
};

#[cfg(all(feature = "audio-io", feature = "whisper"))]
pub use stt::MicrophoneCapture;
#[cfg(feature = "whisper")]
pub use stt::WhisperTranscriber;
#[cfg(all(feature = "sherpa", feature = "audio-io"))]
pub use tts::SherpaSpeaker;
