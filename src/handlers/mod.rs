//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `media` - Twilio media-stream relay WebSocket
//! - `twiml` - TwiML webhook for incoming calls
//! - `voices` - Phonic voice listing endpoint

pub mod api;
pub mod media;
pub mod twiml;
pub mod voices;

// Re-export commonly used handlers for convenient access
pub use media::media_stream_handler;
pub use twiml::serve_twiml;
