use crate::{MentrisError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default microphone, delivering mono blocks over a channel.
///
/// `cpal::Stream` is not `Send`, so open this on the thread that listens.
pub struct AudioInput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    listening: Arc<Mutex<bool>>,
}

impl AudioInput {
    /// Open the default input device
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| MentrisError::AudioDeviceError("No input device available".into()))?;

        info!(
            "Microphone: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = device
            .default_input_config()
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to get input config: {}", e)))?
            .into();

        Ok(Self {
            device,
            config,
            stream: None,
            listening: Arc::new(Mutex::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start the device; every callback block is downmixed and sent on `blocks`
    pub fn start(&mut self, blocks: Sender<Vec<f32>>) -> Result<()> {
        if *self.listening.lock() {
            warn!("Microphone already open");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let listening = Arc::clone(&self.listening);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !*listening.lock() {
                        return;
                    }
                    if blocks.try_send(downmix(data, channels)).is_err() {
                        debug!("Dropped microphone block");
                    }
                },
                |err| error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| MentrisError::AudioDeviceError(format!("Failed to start input stream: {}", e)))?;

        *self.listening.lock() = true;
        self.stream = Some(stream);
        debug!("Microphone started at {} Hz", self.sample_rate());
        Ok(())
    }

    pub fn stop(&mut self) {
        *self.listening.lock() = false;
        if self.stream.take().is_some() {
            debug!("Microphone stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.lock()
    }
}

impl Drop for AudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Average interleaved frames down to one channel
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[0.2, 0.4, -1.0, 1.0], 2), vec![0.3, 0.0]);
        assert_eq!(downmix(&[0.5, 0.25], 1), vec![0.5, 0.25]);
    }

    #[test]
    fn test_listening_state() {
        // No-op on machines without a microphone
        if let Ok(mut input) = AudioInput::open_default() {
            assert!(input.sample_rate() > 0);
            assert!(!input.is_listening());

            let (tx, _rx) = bounded(4);
            if input.start(tx).is_ok() {
                assert!(input.is_listening());
                input.stop();
                assert!(!input.is_listening());
            }
        }
    }
}
