//! Mock Phonic STS server for integration tests.
//!
//! Accepts the bridge's WebSocket connection, records what it receives, and
//! echoes caller audio back as generated speech.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Scripted server behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Echo every audio chunk back as generated speech
    Echo,
    /// Echo, then send `interrupted_response` after the first chunk
    InterruptAfterFirstChunk,
    /// Close the stream as soon as the config message arrives
    CloseAfterConfig,
}

/// What the mock observed, in order.
#[derive(Debug)]
pub enum MockEvent {
    /// The initial config message
    Config(Value),
    /// Base64 payload of one received audio chunk
    AudioChunk(String),
    /// The connection ended
    ConnectionClosed,
}

/// Start the mock server. Returns its WebSocket URL and the event stream.
pub async fn spawn_mock_phonic(mode: MockMode) -> (String, mpsc::UnboundedReceiver<MockEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let events = events_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, mode, events).await {
                    eprintln!("Mock Phonic connection error: {e}");
                }
            });
        }
    });

    (format!("ws://{addr}/sts"), events_rx)
}

async fn handle_connection(
    stream: TcpStream,
    mode: MockMode,
    events: mpsc::UnboundedSender<MockEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    let mut chunk_count = 0u64;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let value: Value = serde_json::from_str(&text)?;
                match value.get("type").and_then(|t| t.as_str()) {
                    Some("config") => {
                        let _ = events.send(MockEvent::Config(value));
                        if mode == MockMode::CloseAfterConfig {
                            write.send(Message::Close(None)).await?;
                            break;
                        }
                    }
                    Some("audio_chunk") => {
                        chunk_count += 1;
                        let audio = value
                            .get("audio")
                            .and_then(|a| a.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let _ = events.send(MockEvent::AudioChunk(audio.clone()));

                        // Echo the chunk back as generated speech
                        let reply = json!({"type": "audio_chunk", "audio": audio});
                        write.send(Message::Text(reply.to_string().into())).await?;

                        if mode == MockMode::InterruptAfterFirstChunk && chunk_count == 1 {
                            let interrupt = json!({"type": "interrupted_response"});
                            write
                                .send(Message::Text(interrupt.to_string().into()))
                                .await?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => write.send(Message::Pong(data)).await?,
            Err(_) => break,
            _ => {}
        }
    }

    let _ = events.send(MockEvent::ConnectionClosed);
    Ok(())
}
