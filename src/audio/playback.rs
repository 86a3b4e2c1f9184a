//! Gap-free audio playback on a virtual playhead
//!
//! Fragments arrive from the network with jitter; the playhead guarantees
//! they render back-to-back with no gap and no overlap, and that an
//! interruption silences everything immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::audio::PlaybackBuffer;
use crate::{Error, Result};

/// Sample rate for playback (matches the model's synthesized audio)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Monotonic clock measured in seconds of output audio time
pub trait AudioClock: Send + Sync {
    /// Current position of the audio clock, in seconds
    fn now(&self) -> f64;
}

/// Clock driven by the number of samples the output stream has rendered
struct StreamClock {
    rendered: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock for StreamClock {
    #[allow(clippy::cast_precision_loss)]
    fn now(&self) -> f64 {
        self.rendered.load(Ordering::Relaxed) as f64 / f64::from(self.sample_rate)
    }
}

/// Wall-time clock for hosts without an output stream
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    /// Create a clock anchored at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for WallClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A buffer registered on the playhead, playing or waiting for its start
struct ActiveSource {
    samples: Vec<f32>,
    start_sample: u64,
    cursor: usize,
}

/// The outcome of scheduling one buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    /// Identifier of the registered source
    pub id: u64,
    /// Absolute start time on the audio clock, in seconds
    pub start_at: f64,
}

/// Virtual timeline state: the next free start position plus the set of
/// in-flight sources.
///
/// `next_start` never decreases except on an explicit interruption reset.
/// Every scheduled buffer starts at `max(next_start, now)` and advances
/// `next_start` by its own duration, so sequential fragments concatenate
/// without gaps or overlap under jittery arrival timing. Arrival order is
/// trusted as play order; the playhead does not reorder.
pub struct Playhead {
    sample_rate: u32,
    next_start: f64,
    sources: HashMap<u64, ActiveSource>,
    next_id: u64,
}

impl Playhead {
    /// Create an empty playhead for the given output rate
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            next_start: 0.0,
            sources: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a buffer against the timeline
    ///
    /// A zero-duration buffer is registered but advances nothing.
    pub fn schedule(&mut self, buffer: PlaybackBuffer, now: f64) -> Scheduled {
        let start_at = self.next_start.max(now);
        self.next_start = start_at + buffer.duration();

        let id = self.next_id;
        self.next_id += 1;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start_sample = (start_at * f64::from(self.sample_rate)).round() as u64;
        self.sources.insert(
            id,
            ActiveSource {
                samples: buffer.into_samples(),
                start_sample,
                cursor: 0,
            },
        );

        Scheduled { id, start_at }
    }

    /// Hard-stop every in-flight source and rewind the timeline
    ///
    /// Returns the number of sources stopped. `next_start` resets to zero
    /// so the next buffer starts at the clock's current time instead of a
    /// stale future timestamp.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.sources.len();
        self.sources.clear();
        self.next_start = 0.0;
        stopped
    }

    /// Number of sources scheduled or currently sounding
    #[must_use]
    pub fn active_sources(&self) -> usize {
        self.sources.len()
    }

    /// The next free position on the timeline, in seconds
    #[must_use]
    pub const fn next_start(&self) -> f64 {
        self.next_start
    }

    /// Render due sources into an interleaved output slice
    ///
    /// `clock_sample` is the absolute sample index of the first output
    /// frame. Sources that finish inside this call are removed; nothing
    /// else observes their completion.
    pub fn mix_into(&mut self, out: &mut [f32], channels: usize, clock_sample: u64) {
        for (frame_index, frame) in out.chunks_mut(channels.max(1)).enumerate() {
            let position = clock_sample + frame_index as u64;
            let mut value = 0.0_f32;

            for source in self.sources.values_mut() {
                if position < source.start_sample || source.cursor >= source.samples.len() {
                    continue;
                }
                value += source.samples[source.cursor];
                source.cursor += 1;
            }

            for slot in frame.iter_mut() {
                *slot = value;
            }
        }

        self.sources
            .retain(|_, source| source.cursor < source.samples.len());
    }
}

/// `Send + Sync` face of the scheduler, shared with the event router
#[derive(Clone)]
pub struct SchedulerHandle {
    playhead: Arc<Mutex<Playhead>>,
    clock: Arc<dyn AudioClock>,
}

impl SchedulerHandle {
    /// Build a handle with no output device behind it
    ///
    /// Used on hosts without audio output; buffers are tracked on the
    /// timeline against the supplied clock but never rendered.
    #[must_use]
    pub fn detached(clock: Arc<dyn AudioClock>) -> Self {
        Self {
            playhead: Arc::new(Mutex::new(Playhead::new(PLAYBACK_SAMPLE_RATE))),
            clock,
        }
    }

    /// Schedule a buffer at `max(next_start, now)`
    pub fn schedule(&self, buffer: PlaybackBuffer) -> Scheduled {
        let now = self.clock.now();
        let scheduled = self.lock().schedule(buffer, now);
        tracing::trace!(start_at = scheduled.start_at, "fragment scheduled");
        scheduled
    }

    /// Stop everything and rewind the timeline to the clock's present
    pub fn interrupt(&self) {
        let stopped = self.lock().interrupt();
        if stopped > 0 {
            tracing::debug!(stopped, "playback interrupted");
        }
    }

    /// Number of sources scheduled or currently sounding
    #[must_use]
    pub fn active_sources(&self) -> usize {
        self.lock().active_sources()
    }

    /// The next free position on the timeline, in seconds
    #[must_use]
    pub fn next_start(&self) -> f64 {
        self.lock().next_start()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Playhead> {
        self.playhead
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current audio clock position, in seconds
    #[must_use]
    pub fn clock_now(&self) -> f64 {
        self.clock.now()
    }
}

/// Owns the output device and stream; its handle does the scheduling
///
/// The cpal stream is not `Send`, so the scheduler lives where it was
/// created and tasks interact through [`SchedulerHandle`] clones.
pub struct PlaybackScheduler {
    device: Device,
    config: StreamConfig,
    rendered: Arc<AtomicU64>,
    handle: SchedulerHandle,
    stream: Option<Stream>,
}

impl PlaybackScheduler {
    /// Acquire the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device or config exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Acquisition("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Acquisition(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Acquisition("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        let rendered = Arc::new(AtomicU64::new(0));
        let clock = Arc::new(StreamClock {
            rendered: Arc::clone(&rendered),
            sample_rate: PLAYBACK_SAMPLE_RATE,
        });

        Ok(Self {
            device,
            config,
            rendered,
            handle: SchedulerHandle::detached(clock),
            stream: None,
        })
    }

    /// Start rendering the timeline to the output device
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let playhead = Arc::clone(&self.handle.playhead);
        let rendered = Arc::clone(&self.rendered);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let clock_sample = rendered.load(Ordering::Relaxed);
                    playhead
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .mix_into(data, channels, clock_sample);
                    rendered.fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        stream.play().map_err(|e| Error::Acquisition(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio playback started");
        Ok(())
    }

    /// Stop rendering and release the output stream
    pub fn stop(&mut self) {
        self.handle.interrupt();
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio playback stopped");
        }
    }

    /// The `Send + Sync` scheduling handle
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }
}
