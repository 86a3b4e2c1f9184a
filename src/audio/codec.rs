//! PCM sample conversion and transport coding
//!
//! Pure functions between f32 samples, 16-bit little-endian PCM, and the
//! base64 coat the live protocol carries audio in.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One quantization step of 16-bit PCM in the f32 domain
pub const QUANT_STEP: f32 = 1.0 / 32768.0;

/// A transport-encoded chunk of 16-bit PCM audio
///
/// Immutable once constructed; ownership transfers to the transport on send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAudioChunk {
    /// Base64-encoded little-endian PCM16 samples
    pub data: String,

    /// MIME-style tag describing encoding and sample rate
    pub mime_type: String,
}

/// A decoded audio buffer ready for scheduling
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PlaybackBuffer {
    /// Construct a buffer from interleaved f32 samples
    #[must_use]
    pub const fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of frames (samples per channel)
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Duration in seconds at the buffer's sample rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// The interleaved samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, yielding its samples
    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Encode f32 samples in `[-1.0, 1.0]` as a transport chunk
///
/// Each sample maps to `round(s * 32768)` clamped to the signed 16-bit
/// range, packed little-endian, then base64-wrapped with a rate tag.
#[must_use]
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> EncodedAudioChunk {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let quantized = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    EncodedAudioChunk {
        data: BASE64.encode(&bytes),
        mime_type: format!("audio/pcm;rate={sample_rate}"),
    }
}

/// Undo the transport coat, yielding raw PCM bytes
///
/// # Errors
///
/// Returns `Error::Decode` if the payload is not valid base64
pub fn decode_chunk(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| Error::Decode(format!("invalid base64 payload: {e}")))
}

/// Decode a transport payload into a playback buffer
///
/// Interprets the bytes as little-endian PCM16 and rescales to f32 by
/// dividing by 32768. No resampling is performed.
///
/// # Errors
///
/// Returns `Error::Decode` if the payload is not valid base64 or its byte
/// length is not a whole multiple of the sample width
pub fn decode_to_playback_buffer(
    data: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<PlaybackBuffer> {
    let bytes = decode_chunk(data)?;

    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "truncated PCM16 payload: {} bytes",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    Ok(PlaybackBuffer::from_samples(samples, sample_rate, channels))
}
