//! TwiML webhook responder.
//!
//! Twilio POSTs here when a call connects. The response is a TwiML document
//! instructing Twilio to open a media stream to this server's `/media`
//! WebSocket endpoint. The document depends only on server configuration, so
//! every caller receives the same bytes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Serve the TwiML document for incoming calls.
pub async fn serve_twiml(State(state): State<Arc<AppState>>) -> Response {
    let body = render_twiml(&state.config.stream_url());
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Render the TwiML document pointing Twilio at the media-stream endpoint.
pub fn render_twiml(stream_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="{}" />
  </Connect>
</Response>
"#,
        xml_escape(stream_url)
    )
}

/// Escape the characters XML forbids inside an attribute value.
fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
