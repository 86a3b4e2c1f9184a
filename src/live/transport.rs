//! Transport boundary for live sessions
//!
//! The network side of a session is a duplex message stream: a connector
//! opens it, a handle sends into it, and inbound traffic arrives as a
//! single consumed sequence of [`TransportEvent`]s.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::audio::EncodedAudioChunk;
use crate::live::protocol::{ServerEvent, SessionConfig, ToolResponse};

/// Inbound traffic from an open transport
#[derive(Debug)]
pub enum TransportEvent {
    /// The remote side acknowledged session setup
    Open,
    /// A protocol event arrived
    Message(ServerEvent),
    /// The transport failed; no further events follow
    Error(String),
    /// The remote side closed the stream; no further events follow
    Closed,
}

/// Establishes live sessions against an inference backend
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session, returning its handle and inbound event stream
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the transport cannot be opened
    async fn connect(
        &self,
        config: SessionConfig,
    ) -> Result<(Box<dyn LiveHandle>, mpsc::Receiver<TransportEvent>)>;
}

/// An open duplex session
#[async_trait]
pub trait LiveHandle: Send + Sync {
    /// Queue a captured audio chunk for delivery
    ///
    /// Fire-and-forget: never blocks the caller. If the transport cannot
    /// accept the chunk it is dropped per transport policy.
    fn send_realtime_input(&self, chunk: EncodedAudioChunk);

    /// Send a tool response frame
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the transport is closed
    async fn send_tool_response(&self, response: ToolResponse) -> Result<()>;

    /// Close the session; calling again is a no-op
    async fn close(&self);
}
