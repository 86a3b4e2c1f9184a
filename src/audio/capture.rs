//! Microphone capture pipeline
//!
//! Streams fixed-size encoded blocks to the session transport while a
//! session is active. The device callback cadence is the flow control:
//! at most one block is in flight at a time.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::audio::codec::{EncodedAudioChunk, encode_frame};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Samples per encoded block handed to the transport
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// Captures audio from the default input device
pub struct CapturePipeline {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl CapturePipeline {
    /// Acquire the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device or config exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Acquisition("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Acquisition(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(CAPTURE_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(CAPTURE_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Acquisition("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(CAPTURE_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Start capturing, forwarding each full block through `sink`
    ///
    /// The sink runs on the device callback thread and must not block;
    /// hand-off to the transport is fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(EncodedAudioChunk) + Send + 'static,
    {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_BLOCK_SIZE);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        pending.push(sample);
                        if pending.len() == CAPTURE_BLOCK_SIZE {
                            sink(encode_frame(&pending, CAPTURE_SAMPLE_RATE));
                            pending.clear();
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        stream.play().map_err(|e| Error::Acquisition(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing and release the device stream
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        CAPTURE_SAMPLE_RATE
    }
}
