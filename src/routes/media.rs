//! Telephony route configuration
//!
//! Configures the two endpoints Twilio talks to.
//!
//! # Endpoints
//!
//! `POST /twiml` - webhook for incoming calls; returns the TwiML document
//! pointing at `/media`
//!
//! `GET /media` - WebSocket upgrade for the per-call audio relay
//!
//! # Protocol
//!
//! After WebSocket upgrade, Twilio sends `connected` and `start` envelopes
//! followed by base64 μ-law `media` frames. The bridge responds with `media`
//! frames carrying generated speech and `clear` on barge-in.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{media_stream_handler, serve_twiml};
use crate::state::AppState;
use std::sync::Arc;

/// Create the telephony router
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/twiml", post(serve_twiml))
        .route("/media", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
