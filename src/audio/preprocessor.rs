use crate::audio::resampler::resample_audio;
use crate::audio::RECOGNIZER_SAMPLE_RATE;
use crate::Result;
use tracing::debug;

/// Root-mean-square level of a block of samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Normalize audio to have peak amplitude of 0.95
pub fn normalize_audio(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let peak = samples
        .iter()
        .map(|&s| s.abs())
        .fold(0.0f32, |max, val| max.max(val));

    if peak == 0.0 || peak.is_nan() {
        return samples.to_vec();
    }

    let gain = 0.95 / peak;
    samples.iter().map(|&s| s * gain).collect()
}

/// Subtract the mean so the signal is centered on zero
pub fn remove_dc_offset(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mean: f32 = samples.iter().sum::<f32>() / samples.len() as f32;
    samples.iter().map(|&s| s - mean).collect()
}

/// Scale samples by `gain`, clamped to the valid range
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

/// Turn a captured mono phrase into what the recognizer expects:
/// centered, 16 kHz, peak-normalized.
pub fn prepare_for_transcription(input: &[f32], input_sample_rate: u32) -> Result<Vec<f32>> {
    debug!(
        "Preparing {} samples at {}Hz for transcription",
        input.len(),
        input_sample_rate
    );

    let centered = remove_dc_offset(input);
    let resampled = resample_audio(&centered, input_sample_rate, RECOGNIZER_SAMPLE_RATE, 1)?;

    Ok(normalize_audio(&resampled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_audio() {
        let input = vec![0.5, -0.3, 0.8, -0.2];
        let output = normalize_audio(&input);
        let peak = output.iter().map(|&s| s.abs()).fold(0.0, f32::max);
        assert!((peak - 0.95).abs() < 0.01);
    }

    #[test]
    fn test_normalize_silence_unchanged() {
        assert_eq!(normalize_audio(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_remove_dc_offset() {
        let input = vec![1.0, 1.1, 0.9, 1.0];
        let output = remove_dc_offset(&input);
        let mean: f32 = output.iter().sum::<f32>() / output.len() as f32;
        assert!(mean.abs() < 0.0001);
    }

    #[test]
    fn test_apply_gain_clamps() {
        let mut samples = vec![0.4, -0.8];
        apply_gain(&mut samples, 2.0);
        assert_eq!(samples, vec![0.8, -1.0]);
    }

    #[test]
    fn test_prepare_at_native_rate_skips_resampling() {
        let input: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.05).sin() * 0.2).collect();
        let output = prepare_for_transcription(&input, RECOGNIZER_SAMPLE_RATE).unwrap();
        assert_eq!(output.len(), input.len());
    }
}
