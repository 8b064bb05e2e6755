//! Twilio media-stream relay.
//!
//! - `handler` - the per-call WebSocket session
//! - `messages` - Twilio Media Streams envelope types

pub mod handler;
pub mod messages;

pub use handler::media_stream_handler;
pub use messages::{TwilioEvent, TwilioOutbound};
