//! Base types for the Phonic Speech-to-Speech client.
//!
//! Defines the error taxonomy, connection state, session configuration and
//! the async callback types through which the client surfaces server events.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::StsAudioFormat;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the Phonic STS API.
#[derive(Debug, Error)]
pub enum StsError {
    /// Connection to the STS endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The server closed the stream
    #[error("Stream closed by server")]
    ConnectionClosed,

    /// Error reported by the STS server
    #[error("Server error: {0}")]
    ServerError(String),
}

/// Result type for STS operations.
pub type StsResult<T> = Result<T, StsError>;

// =============================================================================
// Configuration
// =============================================================================

/// Per-session configuration for the Phonic STS client.
///
/// Sent to the server as the initial `config` message immediately after the
/// WebSocket is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StsConfig {
    /// API key for bearer authentication
    pub api_key: String,

    /// Custom WebSocket endpoint; defaults to the public Phonic STS URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Voice ID for generated speech
    pub voice_id: String,

    /// System prompt for the assistant
    pub system_prompt: String,

    /// Message spoken when the session opens
    pub welcome_message: String,

    /// Audio format of frames sent to the server
    #[serde(default)]
    pub input_format: StsAudioFormat,

    /// Audio format of frames received from the server
    #[serde(default)]
    pub output_format: StsAudioFormat,
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of an STS client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Callback Payloads
// =============================================================================

/// One chunk of generated audio from the server.
///
/// `text` carries the transcript delta voiced by this chunk, when present.
#[derive(Debug, Clone)]
pub struct StsAudioChunk {
    /// Raw audio bytes in the configured output format
    pub audio: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Transcript delta for this chunk
    pub text: Option<String>,
}

/// Transcript emitted by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// The transcribed text
    pub text: String,
    /// Speaker the text belongs to
    pub role: TranscriptRole,
    /// Whether this is a complete utterance rather than a delta
    pub is_final: bool,
}

/// Role of the speaker in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// Caller speech transcript
    User,
    /// Generated assistant speech transcript
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for generated audio chunks.
pub type AudioChunkCallback =
    Arc<dyn Fn(StsAudioChunk) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for transcript events.
pub type TranscriptCallback =
    Arc<dyn Fn(TranscriptResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for unit events (interruption, audio finished).
pub type EventCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for error events.
pub type StsErrorCallback =
    Arc<dyn Fn(StsError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
