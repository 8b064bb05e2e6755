//! Media Relay Tests
//!
//! End-to-end call sessions: a fake Twilio client on one side, a mock Phonic
//! STS server on the other, the bridge in between. Covers ordering, barge-in
//! translation, and close propagation in both directions.

mod mock_phonic;

use std::time::Duration;

use axum::Router;
use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use mock_phonic::{MockEvent, MockMode, spawn_mock_phonic};
use phonic_bridge::{ServerConfig, routes, state::AppState};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the bridge with its STS endpoint pointed at the mock server.
/// Returns the media-stream WebSocket URL.
async fn spawn_bridge(sts_url: String) -> String {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.phonic_api_key = Some("pk-test".to_string());
    config.phonic_sts_url = Some(sts_url);

    let app_state = AppState::new(config).await;
    let app = Router::new()
        .merge(routes::media::create_media_router())
        .with_state(app_state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind bridge");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("bridge server");
    });

    format!("ws://{addr}/media")
}

fn start_envelope(stream_sid: &str) -> String {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "streamSid": stream_sid,
        "start": {
            "accountSid": "AC0123",
            "callSid": "CA0123",
            "tracks": ["inbound"],
            "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
        }
    })
    .to_string()
}

fn media_envelope(stream_sid: &str, seq: u64, track: &str, audio: &[u8]) -> String {
    json!({
        "event": "media",
        "sequenceNumber": seq.to_string(),
        "streamSid": stream_sid,
        "media": {
            "track": track,
            "chunk": seq.to_string(),
            "timestamp": (seq * 20).to_string(),
            "payload": BASE64_STANDARD.encode(audio)
        }
    })
    .to_string()
}

/// Read the next JSON text frame from the bridge, skipping everything else.
async fn next_json<S>(ws: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for bridge message")
            .expect("bridge stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid JSON from bridge");
        }
    }
}

async fn next_event(events: &mut tokio::sync::mpsc::UnboundedReceiver<MockEvent>) -> MockEvent {
    timeout(RECV_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for mock event")
        .expect("mock event channel closed")
}

#[tokio::test]
async fn test_audio_relays_in_order_both_directions() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::Echo).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(
        json!({"event": "connected", "protocol": "Call", "version": "1.0.0"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();

    // The bridge configures Phonic before any audio flows
    match next_event(&mut events).await {
        MockEvent::Config(value) => {
            assert_eq!(value["input_format"], "mulaw_8000");
            assert_eq!(value["output_format"], "mulaw_8000");
            assert_eq!(value["voice_id"], "greta");
            assert!(value["system_prompt"].as_str().is_some());
        }
        other => panic!("Expected config first, got {other:?}"),
    }

    let frames: [&[u8]; 3] = [b"first", b"second", b"third"];
    for (i, frame) in frames.iter().enumerate() {
        ws.send(Message::Text(
            media_envelope("MZtest", i as u64 + 2, "inbound", frame).into(),
        ))
        .await
        .unwrap();
    }

    // Upstream sees the caller audio in arrival order
    for frame in &frames {
        match next_event(&mut events).await {
            MockEvent::AudioChunk(audio) => assert_eq!(audio, BASE64_STANDARD.encode(frame)),
            other => panic!("Expected audio chunk, got {other:?}"),
        }
    }

    // The echoed speech comes back as media envelopes in the same order
    for frame in &frames {
        let value = next_json(&mut ws).await;
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "MZtest");
        assert_eq!(value["media"]["payload"], BASE64_STANDARD.encode(frame));
    }
}

#[tokio::test]
async fn test_outbound_track_frames_are_not_forwarded() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::Echo).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();

    assert!(matches!(next_event(&mut events).await, MockEvent::Config(_)));

    // An echo of our own playback must not reach Phonic
    ws.send(Message::Text(
        media_envelope("MZtest", 2, "outbound", b"playback").into(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(
        media_envelope("MZtest", 3, "inbound", b"caller").into(),
    ))
    .await
    .unwrap();

    match next_event(&mut events).await {
        MockEvent::AudioChunk(audio) => {
            assert_eq!(audio, BASE64_STANDARD.encode(b"caller"));
        }
        other => panic!("Expected the inbound chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn test_interruption_translates_to_clear() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::InterruptAfterFirstChunk).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut events).await, MockEvent::Config(_)));

    ws.send(Message::Text(
        media_envelope("MZtest", 2, "inbound", b"barge").into(),
    ))
    .await
    .unwrap();

    // Echoed audio first, then the barge-in as a clear envelope
    let value = next_json(&mut ws).await;
    assert_eq!(value["event"], "media");

    let value = next_json(&mut ws).await;
    assert_eq!(value["event"], "clear");
    assert_eq!(value["streamSid"], "MZtest");
}

#[tokio::test]
async fn test_twilio_close_ends_phonic_stream() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::Echo).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut events).await, MockEvent::Config(_)));

    ws.close(None).await.unwrap();

    loop {
        match next_event(&mut events).await {
            MockEvent::ConnectionClosed => break,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_stop_event_ends_phonic_stream() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::Echo).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut events).await, MockEvent::Config(_)));

    ws.send(Message::Text(
        json!({"event": "stop", "streamSid": "MZtest"}).to_string().into(),
    ))
    .await
    .unwrap();

    loop {
        match next_event(&mut events).await {
            MockEvent::ConnectionClosed => break,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_phonic_close_ends_twilio_stream() {
    let (sts_url, mut events) = spawn_mock_phonic(MockMode::CloseAfterConfig).await;
    let bridge_url = spawn_bridge(sts_url).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&bridge_url)
        .await
        .expect("connect to bridge");

    ws.send(Message::Text(start_envelope("MZtest").into()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut events).await, MockEvent::Config(_)));

    // The bridge must close the Twilio leg once the Phonic leg is gone
    loop {
        match timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for the bridge to close")
        {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }
}
