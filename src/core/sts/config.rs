//! Phonic STS endpoint constants and audio format configuration.

use serde::{Deserialize, Serialize};

/// Phonic Speech-to-Speech WebSocket endpoint.
pub const PHONIC_STS_URL: &str = "wss://api.phonic.co/v1/sts/ws";

/// Phonic REST API base URL (voices listing).
pub const PHONIC_API_URL: &str = "https://api.phonic.co/v1";

/// Audio formats accepted and produced by the Phonic STS API.
///
/// Telephony media streams carry G.711 μ-law at 8 kHz, which Phonic accepts
/// natively on both directions, so the bridge never transcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StsAudioFormat {
    /// G.711 μ-law, 8 kHz (default; Twilio's media stream format)
    #[default]
    #[serde(rename = "mulaw_8000")]
    Mulaw8000,
    /// PCM 16-bit signed little-endian, 44.1 kHz
    #[serde(rename = "pcm_44100")]
    Pcm44100,
}

impl StsAudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mulaw8000 => "mulaw_8000",
            Self::Pcm44100 => "pcm_44100",
        }
    }

    /// Get the sample rate for this format.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Mulaw8000 => 8000,
            Self::Pcm44100 => 44100,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mulaw_8000" | "mulaw" | "ulaw" | "g711_ulaw" => Self::Mulaw8000,
            "pcm_44100" | "pcm" | "linear16" => Self::Pcm44100,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for StsAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
