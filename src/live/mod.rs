//! Live session protocol, transport, and event routing

pub mod protocol;
mod session;
mod transport;
mod ws;

pub use protocol::{
    FunctionCall, FunctionResponse, InlineData, ModelTurn, Part, RealtimeInput, ServerContent,
    ServerEvent, SessionConfig, ToolCallEvent, ToolResponse, Transcription,
};
pub use session::{InvocationStatus, Session, SessionOptions, SessionState, ToolInvocation};
pub use transport::{LiveConnector, LiveHandle, TransportEvent};
pub use ws::{DEFAULT_ENDPOINT, WsConnector};
