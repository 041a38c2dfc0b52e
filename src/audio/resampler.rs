use crate::{MentrisError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_FRAMES: usize = 1024;

/// Sample-rate converter for interleaved audio.
///
/// Used on captured microphone audio (device rate to 16 kHz) and on
/// synthesized speech (model rate to device rate).
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(MentrisError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }
        if channels == 0 {
            return Err(MentrisError::ConfigError(
                "Number of channels must be greater than 0".into(),
            ));
        }

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            params,
            CHUNK_FRAMES,
            channels as usize,
        )
        .map_err(|e| MentrisError::AudioProcessingError(format!("Failed to create resampler: {}", e)))?;

        debug!(
            "Created resampler: {} Hz -> {} Hz, {} channels",
            input_rate, output_rate, channels
        );

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels: channels as usize,
        })
    }

    /// Convert one complete buffer.
    ///
    /// The filter delay is trimmed so the output lines up with the input and
    /// has `len * output_rate / input_rate` frames.
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let frames = input.len() / self.channels;
        let planar: Vec<Vec<f32>> = (0..self.channels)
            .map(|ch| input.iter().skip(ch).step_by(self.channels).copied().collect())
            .collect();

        let mut out_planar: Vec<Vec<f32>> = vec![Vec::new(); self.channels];
        let mut pos = 0;

        loop {
            let needed = self.resampler.input_frames_next();
            if frames - pos < needed {
                break;
            }
            let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + needed]).collect();
            let processed = self
                .resampler
                .process(&block[..], None)
                .map_err(|e| MentrisError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
            append_planar(&mut out_planar, processed);
            pos += needed;
        }

        if pos < frames {
            let tail: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
            let processed = self
                .resampler
                .process_partial(Some(&tail[..]), None)
                .map_err(|e| MentrisError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
            append_planar(&mut out_planar, processed);
        }

        let expected = (frames as f64 * self.output_rate as f64 / self.input_rate as f64).round() as usize;
        let delay = self.resampler.output_delay();

        // Push zeros through until the delayed tail has come out
        while out_planar[0].len() < delay + expected {
            let processed = self
                .resampler
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| MentrisError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
            if processed[0].is_empty() {
                break;
            }
            append_planar(&mut out_planar, processed);
        }

        let start = delay.min(out_planar[0].len());
        let end = (start + expected).min(out_planar[0].len());

        let mut output = Vec::with_capacity((end - start) * self.channels);
        for frame in start..end {
            for channel in &out_planar {
                output.push(channel[frame]);
            }
        }

        self.resampler.reset();

        debug!("Resampled {} frames -> {} frames", frames, end - start);
        Ok(output)
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn append_planar(target: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (channel, samples) in target.iter_mut().zip(block) {
        channel.extend(samples);
    }
}

/// Resample in one step, passing the input through when the rates match
pub fn resample_audio(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
    channels: u16,
) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    let mut resampler = AudioResampler::new(input_rate, output_rate, channels)?;
    resampler.resample(input)
}
