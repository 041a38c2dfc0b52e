use crate::audio::preprocessor::apply_gain;
use crate::audio::resampler::resample_audio;
use crate::{MentrisError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Default speaker device.
///
/// Each call to [`AudioOutput::play_blocking`] opens its own stream and
/// returns once every sample has been handed to the device.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
}

impl AudioOutput {
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| MentrisError::AudioDeviceError("No output device available".into()))?;

        info!(
            "Speaker: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = device
            .default_output_config()
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to get output config: {}", e)))?
            .into();

        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Play mono `samples` recorded at `sample_rate`, scaled by `volume`
    pub fn play_blocking(&self, samples: &[f32], sample_rate: u32, volume: f32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut mono = resample_audio(samples, sample_rate, self.sample_rate(), 1)?;
        apply_gain(&mut mono, volume);

        let total = mono.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(mono)));
        let feeder = Arc::clone(&queue);
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pending = feeder.lock();
                    for frame in data.chunks_mut(channels) {
                        let sample = pending.pop_front().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                },
                |err| error!("Speaker stream error: {}", err),
                None,
            )
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to start output stream: {}", e)))?;

        while !queue.lock().is_empty() {
            std::thread::sleep(DRAIN_POLL);
        }
        // Let the last device buffer play out
        std::thread::sleep(DRAIN_POLL * 3);

        debug!("Played {} samples at {} Hz", total, self.sample_rate());
        Ok(())
    }
}
