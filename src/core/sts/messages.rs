//! Phonic STS WebSocket message types.
//!
//! All messages are JSON-encoded text frames tagged by `type`.
//!
//! Client messages (sent to server):
//! - config - Session configuration, sent once after connect
//! - audio_chunk - Base64-encoded caller audio
//!
//! Server messages (received from server):
//! - audio_chunk - Base64-encoded generated audio, with an optional
//!   transcript delta
//! - audio_finished - Current response fully voiced
//! - input_text - Transcript of caller speech
//! - interrupted_response - Caller barged in; discard buffered output
//! - error - Server-side failure

use serde::{Deserialize, Serialize};

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Messages sent to the Phonic STS server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Session configuration, sent once immediately after connect
    Config {
        /// Audio format of uploaded frames
        input_format: String,
        /// Audio format of generated frames
        output_format: String,
        /// System prompt for the assistant
        system_prompt: String,
        /// Message spoken when the session opens
        welcome_message: String,
        /// Voice ID for generated speech
        voice_id: String,
    },

    /// One chunk of caller audio, base64-encoded
    AudioChunk {
        /// Base64-encoded audio in the configured input format
        audio: String,
    },
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Messages received from the Phonic STS server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One chunk of generated audio, with an optional transcript delta
    AudioChunk {
        /// Base64-encoded audio in the configured output format
        audio: String,
        /// Transcript delta voiced by this chunk
        #[serde(default)]
        text: Option<String>,
    },

    /// The current response has been fully voiced
    AudioFinished,

    /// Transcript of caller speech
    InputText {
        /// Transcribed text
        text: String,
    },

    /// The caller interrupted the assistant mid-response
    InterruptedResponse,

    /// Server-side failure
    Error {
        /// Human-readable error message
        #[serde(default)]
        message: Option<String>,
        /// Machine-readable error code
        #[serde(default)]
        code: Option<String>,
    },

    /// Any message type this client does not handle
    #[serde(other)]
    Unknown,
}
