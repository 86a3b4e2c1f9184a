//! Session router scenarios
//!
//! Exercises the full event path against a scripted transport, without
//! audio hardware.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use aria_voice::{Session, SessionState};

mod common;

use common::{
    ManualClock, ScriptedRemote, TestDispatcher, headless_options, scripted_transport,
    test_config, wait_until,
};

async fn start_session(
    clock: Arc<ManualClock>,
    dispatcher: TestDispatcher,
) -> (Session, ScriptedRemote) {
    let (connector, remote) = scripted_transport();
    remote.open().await;

    let session = Session::start(
        connector,
        test_config(),
        Arc::new(dispatcher),
        headless_options(clock),
    )
    .await
    .expect("session should start");

    (session, remote)
}

#[tokio::test]
async fn basic_turn_schedules_fragments_back_to_back() {
    let clock = ManualClock::new();
    let (session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;
    assert_eq!(session.state(), SessionState::Active);

    let scheduler = session.scheduler();
    for _ in 0..3 {
        remote.audio_fragment(0.5).await;
    }

    wait_until(|| scheduler.active_sources() == 3).await;
    // Three 0.5s fragments concatenate to exactly 1.5s of scheduled audio
    assert!((scheduler.next_start() - 1.5).abs() < 1e-9);
}

#[tokio::test]
async fn barge_in_stops_playback_and_resets_the_timeline() {
    let clock = ManualClock::new();
    let (session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    let scheduler = session.scheduler();
    for _ in 0..3 {
        remote.audio_fragment(0.5).await;
    }
    wait_until(|| scheduler.active_sources() == 3).await;

    clock.set(0.3);
    remote.interrupt().await;
    wait_until(|| scheduler.active_sources() == 0).await;
    assert!(scheduler.next_start().abs() < f64::EPSILON);

    // A fragment arriving right after starts at the clock, not at 1.5s
    clock.set(0.35);
    remote.audio_fragment(0.5).await;
    wait_until(|| scheduler.active_sources() == 1).await;
    assert!((scheduler.next_start() - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn malformed_fragment_is_dropped_without_ending_the_session() {
    let clock = ManualClock::new();
    let (session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    let scheduler = session.scheduler();

    // Three bytes is not a whole number of PCM16 samples
    remote.raw_audio("AQID").await;
    remote.audio_fragment(0.5).await;

    wait_until(|| scheduler.active_sources() == 1).await;
    assert!((scheduler.next_start() - 0.5).abs() < 1e-9);
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn transcript_is_bounded_with_fifo_eviction() {
    let clock = ManualClock::new();
    let (session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    for i in 0..60 {
        remote.output_transcription(&format!("fragment {i}")).await;
    }
    remote.input_transcription("and the user spoke").await;

    wait_until(|| {
        session
            .transcript()
            .last()
            .is_some_and(|entry| entry.text == "and the user spoke")
    })
    .await;

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 50);
    assert_eq!(transcript.first().unwrap().text, "fragment 11");
}

#[tokio::test]
async fn concurrent_tool_calls_correlate_responses_by_id() {
    let clock = ManualClock::new();
    let dispatcher = TestDispatcher {
        search_delay: Duration::from_millis(200),
    };
    let (_session, remote) = start_session(Arc::clone(&clock), dispatcher).await;

    // One event, two invocations; the slow one was requested first
    remote
        .tool_calls(&[
            ("call-slow", "web_search", json!({ "query": "sensor data" })),
            ("call-fast", "get_weather", json!({ "location": "Oslo" })),
        ])
        .await;

    wait_until(|| remote.tool_responses().len() == 2).await;

    let responses = remote.tool_responses();
    // Completion order inverted the request order
    assert_eq!(responses[0]["functionResponses"][0]["id"], "call-fast");
    assert_eq!(
        responses[0]["functionResponses"][0]["name"],
        "get_weather"
    );
    assert_eq!(responses[1]["functionResponses"][0]["id"], "call-slow");
    assert_eq!(responses[1]["functionResponses"][0]["name"], "web_search");

    // Each response carries its own tool's payload
    assert_eq!(
        responses[0]["functionResponses"][0]["response"]["result"]["location"],
        "Oslo"
    );
    assert_eq!(
        responses[1]["functionResponses"][0]["response"]["result"]["summary"],
        "sensor data"
    );
}

#[tokio::test]
async fn failing_tool_yields_an_error_payload_not_a_dead_session() {
    let clock = ManualClock::new();
    let (session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    remote
        .tool_calls(&[
            ("call-bad", "launch_rocket", json!({})),
            ("call-good", "get_weather", json!({ "location": "Porto" })),
        ])
        .await;

    wait_until(|| remote.tool_responses().len() == 2).await;

    let responses = remote.tool_responses();
    let by_id = |id: &str| {
        responses
            .iter()
            .find(|r| r["functionResponses"][0]["id"] == id)
            .cloned()
            .unwrap()
    };

    let bad = by_id("call-bad");
    assert!(
        bad["functionResponses"][0]["response"]["result"]["error"]
            .as_str()
            .unwrap()
            .contains("unknown tool")
    );

    let good = by_id("call-good");
    assert_eq!(
        good["functionResponses"][0]["response"]["result"]["location"],
        "Porto"
    );

    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn tool_invocations_are_visible_then_expire() {
    let clock = ManualClock::new();
    let dispatcher = TestDispatcher {
        search_delay: Duration::from_millis(200),
    };
    let (session, remote) = start_session(Arc::clone(&clock), dispatcher).await;

    remote
        .tool_calls(&[("call-1", "web_search", json!({ "query": "anything" }))])
        .await;

    wait_until(|| !session.tool_invocations().is_empty()).await;
    let invocations = session.tool_invocations();
    assert_eq!(invocations[0].name, "web_search");

    // After the display window the finished invocation disappears
    wait_until(|| session.tool_invocations().is_empty()).await;
}

#[tokio::test]
async fn stop_is_idempotent() {
    let clock = ManualClock::new();
    let (mut session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    session.stop().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(remote.handle_closed());

    // Second stop is a no-op, not a double release
    session.stop().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn transport_error_drives_the_session_to_closed() {
    let clock = ManualClock::new();
    let (mut session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    remote.fail("stream reset").await;
    session.closed().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(remote.handle_closed());

    session.stop().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn remote_close_drives_the_session_to_closed() {
    let clock = ManualClock::new();
    let (mut session, remote) = start_session(Arc::clone(&clock), TestDispatcher::default()).await;

    remote.close().await;
    session.closed().await;

    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn close_during_setup_fails_the_start() {
    let clock = ManualClock::new();
    let (connector, remote) = scripted_transport();

    // The transport dies before acknowledging setup
    remote.close().await;

    let result = Session::start(
        connector,
        test_config(),
        Arc::new(TestDispatcher::default()),
        headless_options(clock),
    )
    .await;

    assert!(matches!(result, Err(aria_voice::Error::Connection(_))));
}

#[tokio::test]
async fn interruption_does_not_cancel_inflight_tool_calls() {
    let clock = ManualClock::new();
    let dispatcher = TestDispatcher {
        search_delay: Duration::from_millis(150),
    };
    let (_session, remote) = start_session(Arc::clone(&clock), dispatcher).await;

    remote
        .tool_calls(&[("call-1", "web_search", json!({ "query": "still running" }))])
        .await;
    remote.audio_fragment(0.5).await;
    remote.interrupt().await;

    // The interruption silenced playback but the tool still completes
    wait_until(|| remote.tool_responses().len() == 1).await;
    assert_eq!(
        remote.tool_responses()[0]["functionResponses"][0]["response"]["result"]["summary"],
        "still running"
    );
}
