//! Twilio Media Streams message types.
//!
//! Twilio sends JSON text frames over the media WebSocket, tagged by `event`
//! with camelCase field names. Audio payloads are base64-encoded G.711 μ-law
//! at 8 kHz.
//!
//! Inbound events (Twilio -> bridge):
//! - connected - WebSocket handshake complete
//! - start - stream metadata, carries the stream SID
//! - media - one audio frame
//! - stop - stream ended
//! - mark / dtmf - playback marks and keypad digits
//!
//! Outbound events (bridge -> Twilio):
//! - media - one generated audio frame
//! - clear - discard buffered playback (barge-in)

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound Events (Twilio -> bridge)
// =============================================================================

/// Messages received on the Twilio media stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioEvent {
    /// WebSocket handshake complete
    Connected {
        /// Protocol name, e.g. "Call"
        #[serde(default)]
        protocol: Option<String>,
        /// Protocol version
        #[serde(default)]
        version: Option<String>,
    },

    /// Stream started; carries the stream SID used in all outbound envelopes
    Start {
        /// Stream SID
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Stream metadata
        start: StartMeta,
    },

    /// One audio frame
    Media {
        /// Stream SID
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Frame payload and position
        media: MediaPayload,
        /// Monotonic frame counter, as a decimal string
        #[serde(rename = "sequenceNumber", default)]
        sequence_number: Option<String>,
    },

    /// Stream ended
    Stop {
        /// Stream SID
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },

    /// Playback mark acknowledgement
    Mark {
        /// Stream SID
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Mark label
        mark: MarkPayload,
    },

    /// Keypad digit
    Dtmf {
        /// Stream SID
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Digit payload
        dtmf: DtmfPayload,
    },

    /// Any event this bridge does not handle
    #[serde(other)]
    Unknown,
}

/// Metadata carried by the `start` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartMeta {
    /// Twilio account SID
    #[serde(rename = "accountSid", default)]
    pub account_sid: Option<String>,
    /// Call SID the stream belongs to
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
    /// Tracks carried by the stream, e.g. ["inbound"]
    #[serde(default)]
    pub tracks: Option<Vec<String>>,
    /// Audio format of the stream
    #[serde(rename = "mediaFormat", default)]
    pub media_format: Option<MediaFormat>,
}

/// Audio format advertised in the `start` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaFormat {
    /// Encoding, e.g. "audio/x-mulaw"
    pub encoding: String,
    /// Sample rate in Hz
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    /// Channel count
    pub channels: u32,
}

/// Payload of an inbound `media` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaPayload {
    /// Track the frame belongs to ("inbound" or "outbound")
    #[serde(default)]
    pub track: Option<String>,
    /// Frame counter within the track, as a decimal string
    #[serde(default)]
    pub chunk: Option<String>,
    /// Presentation timestamp in milliseconds, as a decimal string
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Base64-encoded audio
    pub payload: String,
}

/// Payload of a `mark` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkPayload {
    /// Mark label
    pub name: String,
}

/// Payload of a `dtmf` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DtmfPayload {
    /// Track the digit was pressed on
    #[serde(default)]
    pub track: Option<String>,
    /// The digit, "0"-"9", "*" or "#"
    pub digit: String,
}

// =============================================================================
// Outbound Events (bridge -> Twilio)
// =============================================================================

/// Messages sent back on the Twilio media stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutbound {
    /// One generated audio frame
    Media {
        /// Stream SID from the `start` event
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Frame payload
        media: OutboundMedia,
    },

    /// Discard buffered playback (barge-in)
    Clear {
        /// Stream SID from the `start` event
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl TwilioOutbound {
    /// Build a `media` envelope from an already base64-encoded payload.
    pub fn media(stream_sid: String, payload: String) -> Self {
        Self::Media {
            stream_sid,
            media: OutboundMedia { payload },
        }
    }
}

/// Payload of an outbound `media` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMedia {
    /// Base64-encoded audio
    pub payload: String,
}

// =============================================================================
// Message Routing
// =============================================================================

/// Routing into the Twilio sender task.
pub enum MediaMessageRoute {
    /// JSON envelope to send
    Outgoing(TwilioOutbound),
    /// Close the WebSocket
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_deserialization() {
        let json = r#"{"event": "connected", "protocol": "Call", "version": "1.0.0"}"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        match event {
            TwilioEvent::Connected { protocol, .. } => {
                assert_eq!(protocol.as_deref(), Some("Call"));
            }
            _ => panic!("Expected Connected variant"),
        }
    }

    #[test]
    fn test_start_deserialization() {
        let json = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ0123",
            "start": {
                "accountSid": "AC0123",
                "callSid": "CA0123",
                "tracks": ["inbound"],
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        }"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        match event {
            TwilioEvent::Start { stream_sid, start } => {
                assert_eq!(stream_sid, "MZ0123");
                assert_eq!(start.call_sid.as_deref(), Some("CA0123"));
                let format = start.media_format.expect("media format");
                assert_eq!(format.encoding, "audio/x-mulaw");
                assert_eq!(format.sample_rate, 8000);
            }
            _ => panic!("Expected Start variant"),
        }
    }

    #[test]
    fn test_media_deserialization() {
        let json = r#"{
            "event": "media",
            "sequenceNumber": "3",
            "streamSid": "MZ0123",
            "media": {"track": "inbound", "chunk": "2", "timestamp": "40", "payload": "fn8="}
        }"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        match event {
            TwilioEvent::Media {
                stream_sid, media, ..
            } => {
                assert_eq!(stream_sid, "MZ0123");
                assert_eq!(media.track.as_deref(), Some("inbound"));
                assert_eq!(media.payload, "fn8=");
            }
            _ => panic!("Expected Media variant"),
        }
    }

    #[test]
    fn test_stop_deserialization() {
        let json = r#"{"event": "stop", "streamSid": "MZ0123"}"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        assert!(matches!(event, TwilioEvent::Stop { .. }));
    }

    #[test]
    fn test_dtmf_deserialization() {
        let json =
            r#"{"event": "dtmf", "streamSid": "MZ0123", "dtmf": {"track": "inbound_track", "digit": "5"}}"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        match event {
            TwilioEvent::Dtmf { dtmf, .. } => assert_eq!(dtmf.digit, "5"),
            _ => panic!("Expected Dtmf variant"),
        }
    }

    #[test]
    fn test_unknown_event_tolerated() {
        let json = r#"{"event": "someday-new", "streamSid": "MZ0123"}"#;
        let event: TwilioEvent = serde_json::from_str(json).expect("Should deserialize");
        assert!(matches!(event, TwilioEvent::Unknown));
    }

    #[test]
    fn test_outbound_media_serialization() {
        let message = TwilioOutbound::media("MZ0123".to_string(), "fn8=".to_string());
        let json = serde_json::to_string(&message).expect("Should serialize");
        assert!(json.contains(r#""event":"media""#));
        assert!(json.contains(r#""streamSid":"MZ0123""#));
        assert!(json.contains(r#""payload":"fn8=""#));
    }

    #[test]
    fn test_outbound_clear_serialization() {
        let message = TwilioOutbound::Clear {
            stream_sid: "MZ0123".to_string(),
        };
        let json = serde_json::to_string(&message).expect("Should serialize");
        assert!(json.contains(r#""event":"clear""#));
        assert!(json.contains(r#""streamSid":"MZ0123""#));
    }
}
