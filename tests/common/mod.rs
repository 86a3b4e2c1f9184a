//! Shared test utilities
//!
//! A scripted transport drives the remote side of a session from tests,
//! and a manual clock makes playhead arithmetic deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use aria_voice::audio::{AudioClock, EncodedAudioChunk, PLAYBACK_SAMPLE_RATE, encode_frame};
use aria_voice::live::{
    LiveConnector, LiveHandle, ServerEvent, SessionConfig, ToolResponse, TransportEvent,
};
use aria_voice::tools::ToolCall;
use aria_voice::{Error, Result, SessionOptions, ToolDispatcher};

/// Manually advanced audio clock
pub struct ManualClock(Mutex<f64>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(0.0)))
    }

    pub fn set(&self, seconds: f64) {
        *self.0.lock().unwrap() = seconds;
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

/// A frame the session sent outbound
#[derive(Debug, Clone)]
pub enum Sent {
    Audio(EncodedAudioChunk),
    ToolResponse(serde_json::Value),
}

/// Test side of the transport: injects events, records outbound frames
pub struct ScriptedRemote {
    events: mpsc::Sender<TransportEvent>,
    sent: Arc<Mutex<Vec<Sent>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedRemote {
    pub async fn open(&self) {
        self.events.send(TransportEvent::Open).await.unwrap();
    }

    pub async fn event(&self, raw: serde_json::Value) {
        let event: ServerEvent = serde_json::from_value(raw).unwrap();
        self.events
            .send(TransportEvent::Message(event))
            .await
            .unwrap();
    }

    /// Inject a synthesized audio fragment of the given duration
    pub async fn audio_fragment(&self, duration_secs: f64) {
        let frames = (duration_secs * f64::from(PLAYBACK_SAMPLE_RATE)).round() as usize;
        let chunk = encode_frame(&vec![0.1_f32; frames], PLAYBACK_SAMPLE_RATE);
        self.raw_audio(&chunk.data).await;
    }

    /// Inject an audio fragment with an arbitrary base64 payload
    pub async fn raw_audio(&self, data: &str) {
        self.event(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        { "inlineData": { "data": data, "mimeType": "audio/pcm;rate=24000" } }
                    ]
                }
            }
        }))
        .await;
    }

    pub async fn input_transcription(&self, text: &str) {
        self.event(json!({ "serverContent": { "inputTranscription": { "text": text } } }))
            .await;
    }

    pub async fn output_transcription(&self, text: &str) {
        self.event(json!({ "serverContent": { "outputTranscription": { "text": text } } }))
            .await;
    }

    pub async fn interrupt(&self) {
        self.event(json!({ "serverContent": { "interrupted": true } }))
            .await;
    }

    /// Inject one tool-call event carrying the given invocations
    pub async fn tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) {
        let function_calls: Vec<serde_json::Value> = calls
            .iter()
            .map(|(id, name, args)| json!({ "id": id, "name": name, "args": args }))
            .collect();
        self.event(json!({ "toolCall": { "functionCalls": function_calls } }))
            .await;
    }

    pub async fn fail(&self, message: &str) {
        self.events
            .send(TransportEvent::Error(message.to_string()))
            .await
            .unwrap();
    }

    pub async fn close(&self) {
        self.events.send(TransportEvent::Closed).await.unwrap();
    }

    /// Outbound tool responses, in send order
    pub fn tool_responses(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|frame| match frame {
                Sent::ToolResponse(value) => Some(value.clone()),
                Sent::Audio(_) => None,
            })
            .collect()
    }

    pub fn handle_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

struct ScriptedHandle {
    sent: Arc<Mutex<Vec<Sent>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl LiveHandle for ScriptedHandle {
    fn send_realtime_input(&self, chunk: EncodedAudioChunk) {
        if !self.closed.load(Ordering::Relaxed) {
            self.sent.lock().unwrap().push(Sent::Audio(chunk));
        }
    }

    async fn send_tool_response(&self, response: ToolResponse) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Connection("transport closed".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::ToolResponse(serde_json::to_value(&response).unwrap()));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

/// Connector yielding a pre-scripted session; connects exactly once
pub struct ScriptedConnector {
    inner: Mutex<Option<(Box<ScriptedHandle>, mpsc::Receiver<TransportEvent>)>>,
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(
        &self,
        _config: SessionConfig,
    ) -> Result<(Box<dyn LiveHandle>, mpsc::Receiver<TransportEvent>)> {
        let (handle, events) = self
            .inner
            .lock()
            .unwrap()
            .take()
            .expect("scripted transport connects once");
        let handle: Box<dyn LiveHandle> = handle;
        Ok((handle, events))
    }
}

/// Build a scripted transport pair
pub fn scripted_transport() -> (Arc<ScriptedConnector>, ScriptedRemote) {
    let (event_tx, event_rx) = mpsc::channel(64);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));

    let handle = Box::new(ScriptedHandle {
        sent: Arc::clone(&sent),
        closed: Arc::clone(&closed),
    });

    (
        Arc::new(ScriptedConnector {
            inner: Mutex::new(Some((handle, event_rx))),
        }),
        ScriptedRemote {
            events: event_tx,
            sent,
            closed,
        },
    )
}

/// Dispatcher with a configurable stall on `web_search`
#[derive(Default)]
pub struct TestDispatcher {
    pub search_delay: Duration,
}

#[async_trait]
impl ToolDispatcher for TestDispatcher {
    async fn execute(&self, call: ToolCall) -> Result<serde_json::Value> {
        match call {
            ToolCall::WebSearch(args) => {
                tokio::time::sleep(self.search_delay).await;
                Ok(json!({ "summary": args.query }))
            }
            ToolCall::GetWeather(args) => Ok(json!({ "location": args.location })),
            other => Ok(json!({ "tool": other.name() })),
        }
    }
}

/// Session config used by the scenario tests
pub fn test_config() -> SessionConfig {
    SessionConfig {
        model: "models/test-audio".to_string(),
        voice: "Charon".to_string(),
        system_instruction: "Keep responses brief.".to_string(),
        tools: Vec::new(),
        input_transcription: true,
        output_transcription: true,
    }
}

/// Options running without audio hardware, on the given clock
pub fn headless_options(clock: Arc<ManualClock>) -> SessionOptions {
    SessionOptions {
        audio: false,
        transcript_capacity: 50,
        clock: Some(clock),
    }
}

/// Poll until the condition holds or a generous timeout elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within timeout");
}
