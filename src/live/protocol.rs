//! Wire types for the live session protocol
//!
//! Inbound events form a discriminated union with optional fields; absent
//! fields deserialize to defaults so unrecognized event kinds degrade to
//! an empty event instead of a parse failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::EncodedAudioChunk;
use crate::tools::ToolDeclaration;

/// Connect-time session configuration handed to the transport
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target model identifier
    pub model: String,

    /// Prebuilt voice for synthesized audio
    pub voice: String,

    /// System instruction string
    pub system_instruction: String,

    /// Tools advertised to the model
    pub tools: Vec<ToolDeclaration>,

    /// Request transcription of captured user audio
    pub input_transcription: bool,

    /// Request transcription of synthesized model audio
    pub output_transcription: bool,
}

/// One inbound event from the inference service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerEvent {
    pub tool_call: Option<ToolCallEvent>,
    pub server_content: Option<ServerContent>,
}

/// A batch of tool invocations requested by the model
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCallEvent {
    pub function_calls: Vec<FunctionCall>,
}

/// One requested tool invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Model-turn content: transcriptions, audio parts, interruption flag
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    pub model_turn: Option<ModelTurn>,
    pub interrupted: bool,
}

/// A transcription fragment on either channel
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

/// Content parts of a model turn
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
}

/// One content part; only inline audio data is consumed here
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub inline_data: Option<InlineData>,
}

/// Base64 payload with a MIME tag
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    #[serde(default)]
    pub mime_type: String,
}

/// Outbound realtime media frame
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media: EncodedAudioChunk,
}

/// Outbound tool response frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

/// Result for one tool invocation, correlated by request id
#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}
