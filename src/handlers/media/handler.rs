//! Twilio media-stream WebSocket handler.
//!
//! One call session per connection: on upgrade the handler opens a Phonic
//! STS stream, then relays audio both ways until either side closes.
//!
//! Twilio -> Phonic: inbound `media` envelopes are base64-decoded and the
//! raw μ-law bytes forwarded to the STS client. Phonic -> Twilio: generated
//! audio chunks are re-encoded into `media` envelopes; a barge-in becomes a
//! `clear` envelope. Each direction flows through a single channel and
//! writer, preserving arrival order.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::prelude::*;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::{select, time::Duration};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::core::sts::{
    PhonicStsClient, StsAudioChunk, StsConfig, StsError, TranscriptResult, TranscriptRole,
};
use crate::state::AppState;

use super::messages::{MediaMessageRoute, TwilioEvent, TwilioOutbound};

/// Channel buffer size for audio workloads.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How often we check if the connection is stale
const PROCESSING_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum idle time before closing the connection. A live Twilio stream
/// delivers a frame every 20 ms, so an idle stream is a dead one.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Media stream WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket and runs one call session.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state))
}

/// Run one call session over an upgraded Twilio socket.
async fn handle_media_socket(mut socket: WebSocket, app_state: Arc<AppState>) {
    let call_id = Uuid::new_v4();
    info!(%call_id, "Media stream connected");

    let Some(api_key) = app_state.config.phonic_api_key.clone() else {
        warn!(%call_id, "PHONIC_API_KEY is not configured, rejecting media stream");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MediaMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing Twilio envelopes
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, MediaMessageRoute::Close);

            let result = match route {
                MediaMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize Twilio envelope: {}", e);
                        continue;
                    }
                },
                MediaMessageRoute::Close => {
                    info!("Closing media stream");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                error!("Failed to send Twilio message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    // Per-call session state shared with the Phonic callbacks
    let stream_sid: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));
    let transcript = Arc::new(Mutex::new(TranscriptBuffer::new()));

    let agent = &app_state.config.agent;
    let sts_config = StsConfig {
        api_key,
        endpoint: app_state.config.phonic_sts_url.clone(),
        voice_id: agent.voice_id.clone(),
        system_prompt: agent.system_prompt.clone(),
        welcome_message: agent.welcome_message.clone(),
        input_format: agent.input_format,
        output_format: agent.output_format,
    };

    let mut client = match PhonicStsClient::new(sts_config) {
        Ok(client) => client,
        Err(e) => {
            error!(%call_id, "Failed to create STS client: {:?}", e);
            let _ = message_tx.send(MediaMessageRoute::Close).await;
            let _ = sender_task.await;
            return;
        }
    };

    register_sts_callbacks(&client, &message_tx, &stream_sid, &transcript).await;

    if let Err(e) = client.connect().await {
        error!(%call_id, "Failed to connect to Phonic STS: {:?}", e);
        let _ = message_tx.send(MediaMessageRoute::Close).await;
        let _ = sender_task.await;
        return;
    }

    // Track last activity time for idle connection detection
    let mut last_activity = Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        let continue_processing =
                            process_twilio_message(msg, &client, &stream_sid).await;
                        if !continue_processing {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(%call_id, "Media stream error: {}", e);
                        break;
                    }
                    None => {
                        info!(%call_id, "Media stream closed by Twilio");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(PROCESSING_TIMEOUT) => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    warn!(
                        %call_id,
                        "Media stream idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    break;
                }
                debug!(%call_id, "Media stream idle check - still active");
            }
        }
    }

    // Cleanup: end the Phonic leg and the writer, flush the transcript tail
    sender_task.abort();

    if let Err(e) = client.disconnect().await {
        error!(%call_id, "Failed to disconnect STS client: {:?}", e);
    }

    if let Some(tail) = transcript.lock().await.flush() {
        info!(%call_id, "Assistant: {}", tail);
    }

    info!(%call_id, "Media stream session ended");
}

/// Wire the Phonic server events back into the Twilio leg.
async fn register_sts_callbacks(
    client: &PhonicStsClient,
    message_tx: &mpsc::Sender<MediaMessageRoute>,
    stream_sid: &Arc<RwLock<Option<String>>>,
    transcript: &Arc<Mutex<TranscriptBuffer>>,
) {
    // Generated audio -> Twilio media envelopes
    let tx = message_tx.clone();
    let sid = stream_sid.clone();
    client
        .on_audio(Arc::new(move |chunk: StsAudioChunk| {
            let tx = tx.clone();
            let sid = sid.clone();
            Box::pin(async move {
                let Some(sid) = sid.read().await.clone() else {
                    debug!("Generated audio before stream start, dropping");
                    return;
                };
                let message = TwilioOutbound::media(sid, BASE64_STANDARD.encode(&chunk.audio));
                let _ = tx.send(MediaMessageRoute::Outgoing(message)).await;
            })
        }))
        .await;

    // Caller transcripts log directly; assistant deltas buffer into sentences
    let buffer = transcript.clone();
    client
        .on_transcript(Arc::new(move |result: TranscriptResult| {
            let buffer = buffer.clone();
            Box::pin(async move {
                match result.role {
                    TranscriptRole::User => info!("Caller: {}", result.text),
                    TranscriptRole::Assistant => {
                        if let Some(sentence) = buffer.lock().await.push(&result.text) {
                            info!("Assistant: {}", sentence);
                        }
                    }
                }
            })
        }))
        .await;

    let buffer = transcript.clone();
    client
        .on_audio_finished(Arc::new(move || {
            let buffer = buffer.clone();
            Box::pin(async move {
                if let Some(tail) = buffer.lock().await.flush() {
                    info!("Assistant: {}", tail);
                }
            })
        }))
        .await;

    // Barge-in: tell Twilio to drop buffered playback
    let tx = message_tx.clone();
    let sid = stream_sid.clone();
    client
        .on_interrupted(Arc::new(move || {
            let tx = tx.clone();
            let sid = sid.clone();
            Box::pin(async move {
                if let Some(sid) = sid.read().await.clone() {
                    let _ = tx
                        .send(MediaMessageRoute::Outgoing(TwilioOutbound::Clear {
                            stream_sid: sid,
                        }))
                        .await;
                }
                info!("Response interrupted");
            })
        }))
        .await;

    // A failed Phonic leg ends the Twilio leg
    let tx = message_tx.clone();
    client
        .on_error(Arc::new(move |error: StsError| {
            let tx = tx.clone();
            Box::pin(async move {
                warn!("STS stream failed: {}", error);
                let _ = tx.send(MediaMessageRoute::Close).await;
            })
        }))
        .await;
}

/// Process one incoming WebSocket message. Returns false to end the session.
async fn process_twilio_message(
    msg: Message,
    client: &PhonicStsClient,
    stream_sid: &Arc<RwLock<Option<String>>>,
) -> bool {
    match msg {
        Message::Text(text) => {
            let event: TwilioEvent = match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    error!("Failed to parse Twilio message: {} - {}", e, text);
                    return true;
                }
            };
            handle_twilio_event(event, client, stream_sid).await
        }
        Message::Binary(_) => {
            debug!("Unexpected binary frame from Twilio, dropping");
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("Media stream close received");
            false
        }
    }
}

/// Handle one parsed Twilio envelope. Returns false to end the session.
async fn handle_twilio_event(
    event: TwilioEvent,
    client: &PhonicStsClient,
    stream_sid: &Arc<RwLock<Option<String>>>,
) -> bool {
    match event {
        TwilioEvent::Connected { protocol, version } => {
            info!(?protocol, ?version, "Twilio connection established");
            true
        }

        TwilioEvent::Start {
            stream_sid: sid,
            start,
        } => {
            info!(stream_sid = %sid, call_sid = ?start.call_sid, "Twilio stream started");
            *stream_sid.write().await = Some(sid);
            true
        }

        TwilioEvent::Media {
            stream_sid: sid,
            media,
            ..
        } => {
            // Only caller audio goes upstream
            if !matches!(media.track.as_deref(), None | Some("inbound")) {
                return true;
            }

            if stream_sid.read().await.is_none() {
                *stream_sid.write().await = Some(sid);
            }

            let audio = match BASE64_STANDARD.decode(media.payload.as_bytes()) {
                Ok(audio) => audio,
                Err(e) => {
                    error!("Failed to decode media payload: {}", e);
                    return true;
                }
            };

            if !client.is_ready() {
                debug!("STS stream not ready, dropping audio frame");
                return true;
            }

            if let Err(e) = client.send_audio(Bytes::from(audio)).await {
                warn!("Failed to forward audio to STS: {:?}", e);
                return false;
            }
            true
        }

        TwilioEvent::Stop { stream_sid: sid } => {
            info!(stream_sid = %sid, "Twilio stream stopped");
            false
        }

        TwilioEvent::Mark { mark, .. } => {
            debug!(name = %mark.name, "Mark acknowledged");
            true
        }

        TwilioEvent::Dtmf { dtmf, .. } => {
            debug!(digit = %dtmf.digit, "DTMF received");
            true
        }

        TwilioEvent::Unknown => {
            trace!("Unhandled Twilio event");
            true
        }
    }
}

/// Accumulates assistant transcript deltas into loggable sentences.
///
/// Deltas are appended until the buffer contains sentence punctuation, at
/// which point the whole buffer is handed back, mirroring how the transcript
/// arrives interleaved with audio chunks.
struct TranscriptBuffer {
    buffer: String,
}

impl TranscriptBuffer {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append a delta; returns the buffered text once it holds a sentence end.
    fn push(&mut self, delta: &str) -> Option<String> {
        self.buffer.push_str(delta);
        if self.buffer.contains(['.', '!', '?']) {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Hand back whatever is buffered, if anything.
    fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_buffer_flushes_on_punctuation() {
        let mut buffer = TranscriptBuffer::new();
        assert_eq!(buffer.push("Hello"), None);
        assert_eq!(buffer.push(" there"), None);
        assert_eq!(
            buffer.push(".").as_deref(),
            Some("Hello there."),
            "Punctuation should flush the accumulated sentence"
        );
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_transcript_buffer_flush_tail() {
        let mut buffer = TranscriptBuffer::new();
        assert_eq!(buffer.push("unfinished thought"), None);
        assert_eq!(buffer.flush().as_deref(), Some("unfinished thought"));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_transcript_buffer_question_mark() {
        let mut buffer = TranscriptBuffer::new();
        assert_eq!(
            buffer.push("How can I help?").as_deref(),
            Some("How can I help?")
        );
    }
}
