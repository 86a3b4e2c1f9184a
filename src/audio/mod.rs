//! Audio capture, PCM codec, and playback scheduling

mod capture;
mod codec;
mod playback;

pub use capture::{CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, CapturePipeline};
pub use codec::{
    EncodedAudioChunk, PlaybackBuffer, QUANT_STEP, decode_chunk, decode_to_playback_buffer,
    encode_frame,
};
pub use playback::{
    AudioClock, PLAYBACK_SAMPLE_RATE, Playhead, PlaybackScheduler, Scheduled, SchedulerHandle,
    WallClock,
};
