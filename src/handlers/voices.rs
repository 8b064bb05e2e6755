//! Voices listing endpoint.
//!
//! Passthrough to Phonic's REST API: returns the voices available to the
//! configured API key so callers can pick a `voice` for the agent.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::core::sts::PHONIC_API_URL;
use crate::state::AppState;

/// One available voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Voice ID, used as the agent `voice` setting
    pub id: String,
    /// Display name of the voice
    pub name: String,
}

/// Response body for `GET /voices`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoicesResponse {
    pub voices: Vec<Voice>,
}

// Phonic API response structures
#[derive(Debug, Deserialize)]
struct PhonicVoicesResponse {
    voices: Vec<PhonicVoice>,
}

#[derive(Debug, Deserialize)]
struct PhonicVoice {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// List the voices available to the configured Phonic API key.
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VoicesResponse>, (StatusCode, String)> {
    let Some(api_key) = state.config.phonic_api_key.as_deref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "PHONIC_API_KEY is not configured".to_string(),
        ));
    };

    let base = state
        .config
        .phonic_api_url
        .as_deref()
        .unwrap_or(PHONIC_API_URL);
    let url = format!("{}/voices", base.trim_end_matches('/'));

    let response = state
        .http_client
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to reach Phonic voices API: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to reach Phonic: {e}"),
            )
        })?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::warn!("Phonic voices API returned {}", status);
        return Err((StatusCode::BAD_GATEWAY, format!("Phonic returned {status}")));
    }

    let upstream: PhonicVoicesResponse = response.json().await.map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            format!("Invalid response from Phonic: {e}"),
        )
    })?;

    let voices = upstream
        .voices
        .into_iter()
        .map(|v| Voice {
            name: v.name.unwrap_or_else(|| v.id.clone()),
            id: v.id,
        })
        .collect();

    Ok(Json(VoicesResponse { voices }))
}
