//! Microphone capture, speaker playback and the sample-level helpers
//! shared by speech recognition and synthesis.

#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod preprocessor;
pub mod resampler;

#[cfg(feature = "audio-io")]
pub use input::AudioInput;
#[cfg(feature = "audio-io")]
pub use output::AudioOutput;
pub use preprocessor::{apply_gain, normalize_audio, prepare_for_transcription, remove_dc_offset, rms};
pub use resampler::{resample_audio, AudioResampler};

/// Sample rate expected by the speech recognizer
pub const RECOGNIZER_SAMPLE_RATE: u32 = 16000;
