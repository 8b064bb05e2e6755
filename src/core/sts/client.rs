//! Phonic STS WebSocket client.
//!
//! Owns the outbound connection to Phonic's Speech-to-Speech endpoint.
//! Outgoing messages are serialized by a spawned connection task fed through
//! an mpsc channel; incoming messages are dispatched to registered async
//! callbacks. There is no automatic reconnection: a dropped stream ends the
//! call session that owns this client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::prelude::*;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

use super::base::{
    AudioChunkCallback, ConnectionState, EventCallback, StsAudioChunk, StsConfig, StsError,
    StsErrorCallback, StsResult, TranscriptCallback, TranscriptResult, TranscriptRole,
};
use super::config::PHONIC_STS_URL;
use super::messages::{ClientMessage, ServerMessage};

/// Channel capacity for outbound WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Phonic STS client.
///
/// # Thread Safety
///
/// All mutable state is wrapped in `Arc` so it can be shared between the
/// owning struct and the spawned connection task. The `connected` flag uses
/// `Arc<AtomicBool>` for lock-free status checks from the relay loop.
pub struct PhonicStsClient {
    /// Session configuration
    config: StsConfig,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag shared with the connection task
    connected: Arc<AtomicBool>,
    /// Flag to suppress the error callback on intentional disconnect
    intentional_disconnect: Arc<AtomicBool>,

    /// Outbound message channel into the connection task
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,

    /// Callbacks
    audio_callback: Arc<Mutex<Option<AudioChunkCallback>>>,
    transcript_callback: Arc<Mutex<Option<TranscriptCallback>>>,
    interrupted_callback: Arc<Mutex<Option<EventCallback>>>,
    audio_finished_callback: Arc<Mutex<Option<EventCallback>>>,
    error_callback: Arc<Mutex<Option<StsErrorCallback>>>,

    /// Connection task handle
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PhonicStsClient {
    /// Create a new client.
    ///
    /// Fails when the API key is empty; the endpoint default is filled in at
    /// connect time.
    pub fn new(config: StsConfig) -> StsResult<Self> {
        if config.api_key.is_empty() {
            return Err(StsError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            audio_callback: Arc::new(Mutex::new(None)),
            transcript_callback: Arc::new(Mutex::new(None)),
            interrupted_callback: Arc::new(Mutex::new(None)),
            audio_finished_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            connection_handle: Arc::new(Mutex::new(None)),
        })
    }

    /// The endpoint this client connects to.
    pub fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(PHONIC_STS_URL)
    }

    /// Check if the client is connected and ready.
    pub fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    /// Register a callback for generated audio chunks.
    pub async fn on_audio(&self, callback: AudioChunkCallback) {
        *self.audio_callback.lock().await = Some(callback);
    }

    /// Register a callback for transcript events (caller and assistant).
    pub async fn on_transcript(&self, callback: TranscriptCallback) {
        *self.transcript_callback.lock().await = Some(callback);
    }

    /// Register a callback for barge-in interruptions.
    pub async fn on_interrupted(&self, callback: EventCallback) {
        *self.interrupted_callback.lock().await = Some(callback);
    }

    /// Register a callback fired when a response has been fully voiced.
    pub async fn on_audio_finished(&self, callback: EventCallback) {
        *self.audio_finished_callback.lock().await = Some(callback);
    }

    /// Register a callback for stream errors and abnormal closure.
    pub async fn on_error(&self, callback: StsErrorCallback) {
        *self.error_callback.lock().await = Some(callback);
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Connect to the STS endpoint and send the initial `config` message.
    pub async fn connect(&mut self) -> StsResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connecting;

        let endpoint = self.endpoint().to_string();
        let request = build_connect_request(&endpoint, &self.config.api_key)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| StsError::ConnectionFailed(e.to_string()))?;

        tracing::info!(endpoint = %endpoint, "Connected to Phonic STS");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock().await = Some(tx);

        // Clone references for the connection task
        let audio_cb = self.audio_callback.clone();
        let transcript_cb = self.transcript_callback.clone();
        let interrupted_cb = self.interrupted_callback.clone();
        let finished_cb = self.audio_finished_callback.clone();
        let error_cb = self.error_callback.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let intentional_disconnect = self.intentional_disconnect.clone();
        let ws_sender = self.ws_sender.clone();
        let output_sample_rate = self.config.output_format.sample_rate();

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connected;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Outgoing messages
                    Some(message) = rx.recv() => {
                        let json = match serde_json::to_string(&message) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize STS message: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send STS message: {}", e);
                            break;
                        }
                    }

                    // Incoming messages
                    Some(msg) = ws_stream.next() => {
                        match msg {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(message) => {
                                        Self::handle_server_message(
                                            message,
                                            output_sample_rate,
                                            &audio_cb,
                                            &transcript_cb,
                                            &interrupted_cb,
                                            &finished_cb,
                                            &error_cb,
                                        ).await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse STS message: {} - {}", e, text);
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => {
                                tracing::info!("STS stream closed by server");
                                break;
                            }
                            Ok(Message::Ping(data)) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Err(e) => {
                                tracing::error!("STS WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }

                    else => break,
                }
            }

            connected.store(false, Ordering::SeqCst);
            *state.write().await = ConnectionState::Disconnected;
            *ws_sender.lock().await = None;

            // Abnormal closure ends the owning session through the error callback
            if !intentional_disconnect.load(Ordering::SeqCst)
                && let Some(cb) = error_cb.lock().await.as_ref()
            {
                cb(StsError::ConnectionClosed).await;
            }

            tracing::debug!("STS connection task ended");
        });

        *self.connection_handle.lock().await = Some(handle);

        // Initial session configuration
        let config_message = ClientMessage::Config {
            input_format: self.config.input_format.as_str().to_string(),
            output_format: self.config.output_format.as_str().to_string(),
            system_prompt: self.config.system_prompt.clone(),
            welcome_message: self.config.welcome_message.clone(),
            voice_id: self.config.voice_id.clone(),
        };
        self.send_message(config_message).await?;

        Ok(())
    }

    /// Disconnect from the STS endpoint.
    pub async fn disconnect(&mut self) -> StsResult<()> {
        self.intentional_disconnect.store(true, Ordering::SeqCst);

        *self.ws_sender.lock().await = None;

        if let Some(handle) = self.connection_handle.lock().await.take() {
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Disconnected;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Audio I/O
    // -------------------------------------------------------------------------

    /// Send one chunk of caller audio in the configured input format.
    pub async fn send_audio(&self, audio: Bytes) -> StsResult<()> {
        let message = ClientMessage::AudioChunk {
            audio: BASE64_STANDARD.encode(&audio),
        };
        self.send_message(message).await
    }

    /// Route a message into the connection task.
    async fn send_message(&self, message: ClientMessage) -> StsResult<()> {
        let guard = self.ws_sender.lock().await;
        let sender = guard.as_ref().ok_or(StsError::NotConnected)?;
        sender
            .send(message)
            .await
            .map_err(|e| StsError::WebSocketError(e.to_string()))
    }

    /// Dispatch one server message to the registered callbacks.
    async fn handle_server_message(
        message: ServerMessage,
        output_sample_rate: u32,
        audio_cb: &Arc<Mutex<Option<AudioChunkCallback>>>,
        transcript_cb: &Arc<Mutex<Option<TranscriptCallback>>>,
        interrupted_cb: &Arc<Mutex<Option<EventCallback>>>,
        finished_cb: &Arc<Mutex<Option<EventCallback>>>,
        error_cb: &Arc<Mutex<Option<StsErrorCallback>>>,
    ) {
        match message {
            ServerMessage::AudioChunk { audio, text } => {
                let audio_bytes = match BASE64_STANDARD.decode(&audio) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!("Failed to decode STS audio chunk: {}", e);
                        return;
                    }
                };

                // Assistant transcript deltas ride along with the audio
                if let Some(ref delta) = text
                    && !delta.is_empty()
                    && let Some(cb) = transcript_cb.lock().await.as_ref()
                {
                    cb(TranscriptResult {
                        text: delta.clone(),
                        role: TranscriptRole::Assistant,
                        is_final: false,
                    })
                    .await;
                }

                if let Some(cb) = audio_cb.lock().await.as_ref() {
                    cb(StsAudioChunk {
                        audio: Bytes::from(audio_bytes),
                        sample_rate: output_sample_rate,
                        text,
                    })
                    .await;
                }
            }

            ServerMessage::AudioFinished => {
                tracing::debug!("STS response fully voiced");
                if let Some(cb) = finished_cb.lock().await.as_ref() {
                    cb().await;
                }
            }

            ServerMessage::InputText { text } => {
                if let Some(cb) = transcript_cb.lock().await.as_ref() {
                    cb(TranscriptResult {
                        text,
                        role: TranscriptRole::User,
                        is_final: true,
                    })
                    .await;
                }
            }

            ServerMessage::InterruptedResponse => {
                tracing::debug!("STS response interrupted");
                if let Some(cb) = interrupted_cb.lock().await.as_ref() {
                    cb().await;
                }
            }

            ServerMessage::Error { message, code } => {
                let detail = match (code, message) {
                    (Some(code), Some(message)) => format!("{}: {}", code, message),
                    (None, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => "unspecified error".to_string(),
                };
                tracing::error!("STS server error: {}", detail);
                if let Some(cb) = error_cb.lock().await.as_ref() {
                    cb(StsError::ServerError(detail)).await;
                }
            }

            ServerMessage::Unknown => {
                tracing::trace!("Unhandled STS message");
            }
        }
    }
}

/// Build the WebSocket upgrade request with bearer authentication.
fn build_connect_request(endpoint: &str, api_key: &str) -> StsResult<http::Request<()>> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| StsError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| StsError::InvalidConfiguration("endpoint has no host".to_string()))?;
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    http::Request::builder()
        .uri(endpoint)
        .header("Authorization", format!("Bearer {api_key}"))
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host_header)
        .body(())
        .map_err(|e| StsError::ConnectionFailed(e.to_string()))
}
