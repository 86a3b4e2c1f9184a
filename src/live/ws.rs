//! WebSocket transport for Gemini-Live-style endpoints
//!
//! Frames are JSON both ways. Outbound traffic goes through an unbounded
//! queue so audio hand-off from the capture callback never blocks; a
//! writer task drains the queue into the socket.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::audio::EncodedAudioChunk;
use crate::live::protocol::{RealtimeInput, ServerEvent, SessionConfig, ToolResponse};
use crate::live::transport::{LiveConnector, LiveHandle, TransportEvent};
use crate::{Error, Result};

/// Default live endpoint for the Gemini bidirectional API
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Inbound event channel depth
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connects sessions over a WebSocket
pub struct WsConnector {
    endpoint: String,
    api_key: String,
}

impl WsConnector {
    /// Create a connector for the given endpoint and API key
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Build the session setup frame sent immediately after connect
    fn setup_frame(config: &SessionConfig) -> serde_json::Value {
        let mut setup = json!({
            "model": config.model,
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": config.voice } }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": config.system_instruction }]
            },
            "tools": [{ "functionDeclarations": config.tools }]
        });

        if config.input_transcription {
            setup["inputAudioTranscription"] = json!({});
        }
        if config.output_transcription {
            setup["outputAudioTranscription"] = json!({});
        }

        json!({ "setup": setup })
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(
        &self,
        config: SessionConfig,
    ) -> Result<(Box<dyn LiveHandle>, mpsc::Receiver<TransportEvent>)> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::Connection(format!("connect failed: {e}")))?;

        tracing::debug!(endpoint = %self.endpoint, model = %config.model, "transport connected");

        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(Self::setup_frame(&config).to_string()))
            .await
            .map_err(|e| Error::Connection(format!("setup send failed: {e}")))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        // Writer: drain the outbound queue into the socket
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if sink.send(frame).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Reader: translate socket frames into transport events
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        forward_frame(text.as_bytes(), &event_tx).await;
                    }
                    Ok(Message::Binary(data)) => {
                        forward_frame(&data, &event_tx).await;
                    }
                    Ok(Message::Close(_)) => {
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            let _ = event_tx.send(TransportEvent::Closed).await;
        });

        let handle: Box<dyn LiveHandle> = Box::new(WsHandle {
            out: out_tx,
            closed: AtomicBool::new(false),
        });

        Ok((handle, event_rx))
    }
}

/// Parse one JSON frame and forward it as a transport event
async fn forward_frame(raw: &[u8], events: &mpsc::Sender<TransportEvent>) {
    let value: serde_json::Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            // Unrecognized frames are a forward-compatible no-op
            tracing::debug!(error = %e, "ignoring unparseable frame");
            return;
        }
    };

    if value.get("setupComplete").is_some() {
        let _ = events.send(TransportEvent::Open).await;
        return;
    }

    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => {
            let _ = events.send(TransportEvent::Message(event)).await;
        }
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed event");
        }
    }
}

/// Handle over the outbound queue of an open socket
struct WsHandle {
    out: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
}

impl WsHandle {
    fn send_frame(&self, frame: serde_json::Value) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Connection("transport closed".to_string()));
        }
        self.out
            .send(Message::Text(frame.to_string()))
            .map_err(|_| Error::Connection("transport closed".to_string()))
    }
}

#[async_trait]
impl LiveHandle for WsHandle {
    fn send_realtime_input(&self, chunk: EncodedAudioChunk) {
        let frame = json!({ "realtimeInput": RealtimeInput { media: chunk } });
        if self.send_frame(frame).is_err() {
            tracing::trace!("audio chunk dropped, transport closed");
        }
    }

    async fn send_tool_response(&self, response: ToolResponse) -> Result<()> {
        self.send_frame(json!({ "toolResponse": response }))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            let _ = self.out.send(Message::Close(None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_frame_carries_model_voice_and_tools() {
        let config = SessionConfig {
            model: "models/test-audio".to_string(),
            voice: "Charon".to_string(),
            system_instruction: "Be brief.".to_string(),
            tools: crate::tools::Toolbox::declarations(),
            input_transcription: true,
            output_transcription: true,
        };

        let frame = WsConnector::setup_frame(&config);
        let setup = &frame["setup"];

        assert_eq!(setup["model"], "models/test-audio");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Charon"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(
            setup["tools"][0]["functionDeclarations"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
        assert!(setup.get("inputAudioTranscription").is_some());
        assert!(setup.get("outputAudioTranscription").is_some());
    }

    #[test]
    fn setup_frame_omits_transcription_when_disabled() {
        let config = SessionConfig {
            model: "models/test-audio".to_string(),
            voice: "Charon".to_string(),
            system_instruction: String::new(),
            tools: Vec::new(),
            input_transcription: false,
            output_transcription: false,
        };

        let frame = WsConnector::setup_frame(&config);
        assert!(frame["setup"].get("inputAudioTranscription").is_none());
        assert!(frame["setup"].get("outputAudioTranscription").is_none());
    }
}
