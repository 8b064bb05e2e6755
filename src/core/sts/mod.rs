//! Phonic Speech-to-Speech client module.
//!
//! Provides the WebSocket client used by the media relay to stream caller
//! audio to Phonic and receive generated speech back.
//!
//! # Architecture
//!
//! - `base` - error taxonomy, connection state, callback types
//! - `config` - endpoint constants and audio formats
//! - `messages` - wire message types
//! - `client` - the connection-task-based client

mod base;
pub mod config;
pub mod messages;

mod client;

pub use base::{
    AudioChunkCallback, ConnectionState, EventCallback, StsAudioChunk, StsConfig, StsError,
    StsErrorCallback, StsResult, TranscriptCallback, TranscriptResult, TranscriptRole,
};
pub use client::PhonicStsClient;
pub use config::{PHONIC_API_URL, PHONIC_STS_URL, StsAudioFormat};
pub use messages::{ClientMessage, ServerMessage};
