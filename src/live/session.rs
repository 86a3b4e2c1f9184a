//! Session lifecycle and event routing
//!
//! A [`Session`] owns its transport handle, capture pipeline, and playback
//! scheduler outright; it is constructed by [`Session::start`] and fully
//! consumed by [`Session::stop`]. One event-loop task demultiplexes
//! inbound traffic; tool calls run as independent spawned tasks so they
//! can never stall the audio path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;

use crate::audio::{
    CapturePipeline, PLAYBACK_SAMPLE_RATE, PlaybackScheduler, SchedulerHandle, WallClock,
    decode_to_playback_buffer,
};
use crate::live::protocol::{
    FunctionCall, FunctionResponse, ServerContent, ServerEvent, SessionConfig, ToolResponse,
};
use crate::live::transport::{LiveConnector, LiveHandle, TransportEvent};
use crate::tools::{ToolCall, ToolDispatcher};
use crate::transcript::{Speaker, Transcript, TranscriptEntry};
use crate::{Error, Result};

/// How long a completed invocation stays visible before expiring
const TOOL_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

impl SessionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Active,
            3 => Self::Closed,
            _ => Self::Idle,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Active => 2,
            Self::Closed => 3,
        }
    }
}

/// Status of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Executing,
    Completed,
    Failed,
}

/// An in-flight or recently finished tool invocation
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
    pub status: InvocationStatus,
    pub result: Option<serde_json::Value>,
}

/// Options for session construction
#[derive(Clone)]
pub struct SessionOptions {
    /// Acquire microphone and speaker devices; disable on headless hosts
    pub audio: bool,

    /// Transcript entries retained before FIFO eviction
    pub transcript_capacity: usize,

    /// Audio clock override when running without an output device
    pub clock: Option<Arc<dyn crate::audio::AudioClock>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            audio: true,
            transcript_capacity: crate::transcript::DEFAULT_TRANSCRIPT_CAPACITY,
            clock: None,
        }
    }
}

/// State shared between the session owner and its spawned tasks
struct RouterShared {
    state: AtomicU8,
    handle: Arc<dyn LiveHandle>,
    scheduler: SchedulerHandle,
    transcript: Mutex<Transcript>,
    invocations: Mutex<HashMap<String, ToolInvocation>>,
    tools: Arc<dyn ToolDispatcher>,
}

impl RouterShared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// An owned live conversation session
pub struct Session {
    shared: Arc<RouterShared>,
    capture: Option<CapturePipeline>,
    playback: Option<PlaybackScheduler>,
    event_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Start a session: acquire audio devices and open the transport
    /// concurrently, then begin streaming once the remote side is ready
    ///
    /// # Errors
    ///
    /// Returns `Error::Acquisition` if a device cannot be opened and
    /// `Error::Connection` if the transport fails to open; either way no
    /// session exists afterwards and a fresh start is required
    pub async fn start(
        connector: Arc<dyn LiveConnector>,
        config: SessionConfig,
        tools: Arc<dyn ToolDispatcher>,
        options: SessionOptions,
    ) -> Result<Self> {
        tracing::info!(model = %config.model, "session connecting");

        // Transport connect runs while devices are acquired
        let connect_task = {
            let connector = Arc::clone(&connector);
            tokio::spawn(async move { connector.connect(config).await })
        };

        let audio = if options.audio {
            match CapturePipeline::new().and_then(|capture| {
                let playback = PlaybackScheduler::new()?;
                Ok((capture, playback))
            }) {
                Ok(devices) => Some(devices),
                Err(e) => {
                    connect_task.abort();
                    return Err(e);
                }
            }
        } else {
            None
        };

        let (handle, mut events) = connect_task
            .await
            .map_err(|e| Error::Connection(format!("connect task failed: {e}")))??;
        let handle: Arc<dyn LiveHandle> = Arc::from(handle);

        // Connecting -> Active happens on the transport's open signal
        loop {
            match events.recv().await {
                Some(TransportEvent::Open) => break,
                Some(TransportEvent::Message(_)) => {
                    tracing::debug!("event before session open ignored");
                }
                Some(TransportEvent::Error(e)) => {
                    handle.close().await;
                    return Err(Error::Connection(e));
                }
                Some(TransportEvent::Closed) | None => {
                    handle.close().await;
                    return Err(Error::Connection(
                        "transport closed during setup".to_string(),
                    ));
                }
            }
        }

        let (scheduler, mut capture, playback) = match audio {
            Some((capture_pipeline, mut playback)) => {
                if let Err(e) = playback.start() {
                    handle.close().await;
                    return Err(e);
                }
                (playback.handle(), Some(capture_pipeline), Some(playback))
            }
            None => {
                let clock = options.clock.unwrap_or_else(|| Arc::new(WallClock::new()));
                (SchedulerHandle::detached(clock), None, None)
            }
        };

        if let Some(capture_pipeline) = capture.as_mut() {
            let sink_handle = Arc::clone(&handle);
            let started = capture_pipeline.start(move |chunk| {
                sink_handle.send_realtime_input(chunk);
            });
            if let Err(e) = started {
                handle.close().await;
                return Err(e);
            }
        }

        let shared = Arc::new(RouterShared {
            state: AtomicU8::new(SessionState::Active.as_u8()),
            handle: Arc::clone(&handle),
            scheduler,
            transcript: Mutex::new(Transcript::with_capacity(options.transcript_capacity)),
            invocations: Mutex::new(HashMap::new()),
            tools,
        });

        let event_task = tokio::spawn(run_event_loop(Arc::clone(&shared), events));

        tracing::info!("session active");
        Ok(Self {
            shared,
            capture,
            playback,
            event_task: Some(event_task),
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The playback scheduler's shared handle
    #[must_use]
    pub fn scheduler(&self) -> SchedulerHandle {
        self.shared.scheduler.clone()
    }

    /// Snapshot of the transcript, oldest first
    #[must_use]
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared
            .transcript
            .lock()
            .map(|t| t.snapshot())
            .unwrap_or_default()
    }

    /// Snapshot of visible tool invocations
    #[must_use]
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.shared
            .invocations
            .lock()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Wait until the event loop ends (remote close or transport error)
    pub async fn closed(&mut self) {
        if let Some(task) = self.event_task.take() {
            let _ = task.await;
        }
    }

    /// Stop the session and release every resource; idempotent
    ///
    /// Outstanding tool tasks run to completion but their responses are
    /// undeliverable once the handle is closed and are discarded.
    pub async fn stop(&mut self) {
        if self.shared.state() == SessionState::Closed
            && self.capture.is_none()
            && self.playback.is_none()
            && self.event_task.is_none()
        {
            return;
        }

        self.shared.set_state(SessionState::Closed);
        self.shared.handle.close().await;

        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        self.shared.scheduler.interrupt();

        if let Some(task) = self.event_task.take() {
            task.abort();
            let _ = task.await;
        }

        tracing::info!("session stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

/// Consume inbound transport events until the stream ends
async fn run_event_loop(
    shared: Arc<RouterShared>,
    mut events: tokio::sync::mpsc::Receiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(message) => route_event(&shared, message),
            TransportEvent::Open => {}
            TransportEvent::Error(e) => {
                tracing::error!(error = %e, "transport error");
                break;
            }
            TransportEvent::Closed => {
                tracing::info!("transport closed by remote");
                break;
            }
        }
    }

    // Any exit drives the session to Closed; no automatic reconnect
    shared.set_state(SessionState::Closed);
    shared.handle.close().await;
    shared.scheduler.interrupt();
}

/// Dispatch one inbound event to the scheduler, transcript, or tools
fn route_event(shared: &Arc<RouterShared>, event: ServerEvent) {
    if let Some(tool_call) = event.tool_call {
        // Invocations are independent: one failing or stalling must not
        // block the others, and each gets its own response frame
        for call in tool_call.function_calls {
            spawn_tool_task(Arc::clone(shared), call);
        }
    }

    if let Some(content) = event.server_content {
        route_server_content(shared, content);
    }
}

fn route_server_content(shared: &Arc<RouterShared>, content: ServerContent) {
    if let Some(transcription) = content.input_transcription {
        if !transcription.text.is_empty() {
            push_transcript(shared, Speaker::Local, transcription.text);
        }
    }

    if let Some(transcription) = content.output_transcription {
        if !transcription.text.is_empty() {
            push_transcript(shared, Speaker::Remote, transcription.text);
        }
    }

    if let Some(turn) = content.model_turn {
        for part in turn.parts {
            let Some(inline) = part.inline_data else {
                continue;
            };
            match decode_to_playback_buffer(&inline.data, PLAYBACK_SAMPLE_RATE, 1) {
                Ok(buffer) => {
                    shared.scheduler.schedule(buffer);
                }
                Err(e) => {
                    // A malformed fragment is dropped; the session continues
                    tracing::warn!(error = %e, "audio fragment dropped");
                }
            }
        }
    }

    if content.interrupted {
        shared.scheduler.interrupt();
    }
}

fn push_transcript(shared: &Arc<RouterShared>, speaker: Speaker, text: String) {
    if let Ok(mut transcript) = shared.transcript.lock() {
        transcript.push(speaker, text);
    }
}

/// Execute one tool invocation on its own task and report the result
///
/// No deadline is imposed on execution; a stalled dispatcher leaves the
/// invocation visible in `executing` state.
fn spawn_tool_task(shared: Arc<RouterShared>, call: FunctionCall) {
    if let Ok(mut invocations) = shared.invocations.lock() {
        invocations.insert(
            call.id.clone(),
            ToolInvocation {
                id: call.id.clone(),
                name: call.name.clone(),
                args: call.args.clone(),
                status: InvocationStatus::Executing,
                result: None,
            },
        );
    }

    tokio::spawn(async move {
        let outcome = match ToolCall::parse(&call.name, &call.args) {
            Ok(parsed) => shared.tools.execute(parsed).await,
            Err(e) => Err(e),
        };

        let (payload, status) = match outcome {
            Ok(value) => (value, InvocationStatus::Completed),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                (json!({ "error": e.to_string() }), InvocationStatus::Failed)
            }
        };

        if let Ok(mut invocations) = shared.invocations.lock() {
            if let Some(invocation) = invocations.get_mut(&call.id) {
                invocation.status = status;
                invocation.result = Some(payload.clone());
            }
        }

        let response = ToolResponse {
            function_responses: vec![FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: json!({ "result": payload }),
            }],
        };

        if let Err(e) = shared.handle.send_tool_response(response).await {
            // The session may already be closed; the result is discarded
            tracing::debug!(tool = %call.name, error = %e, "tool response undeliverable");
        }

        tokio::time::sleep(TOOL_DISPLAY_WINDOW).await;
        if let Ok(mut invocations) = shared.invocations.lock() {
            invocations.remove(&call.id);
        }
    });
}
