//! Aria - real-time voice assistant client
//!
//! Holds a full-duplex audio conversation with a remote live inference
//! service while executing the tool calls it issues and keeping a live
//! transcript.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  encoded blocks   ┌──────────────────────┐
//! │ Capture       │──────────────────▶│                      │
//! │ (mic, 16 kHz) │                   │   Live Transport     │
//! └───────────────┘                   │   (duplex stream)    │
//! ┌───────────────┐  decoded buffers  │                      │
//! │ Playback      │◀─────┐            └──────────┬───────────┘
//! │ (24 kHz)      │      │                       │ events
//! └───────────────┘      │            ┌──────────▼───────────┐
//!                        └────────────│   Session Router     │
//!        transcript / memory / tools ◀│   (state machine)    │
//!                                     └──────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod live;
pub mod memory;
pub mod tools;
pub mod transcript;

pub use config::Config;
pub use error::{Error, Result};
pub use live::{Session, SessionConfig, SessionOptions, SessionState};
pub use memory::{MemoryCategory, MemoryFact, MemoryStore};
pub use tools::{ToolCall, ToolDispatcher, Toolbox};
pub use transcript::{Speaker, Transcript, TranscriptEntry};
