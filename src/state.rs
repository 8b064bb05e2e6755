//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;

/// State shared by all handlers.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// HTTP client for Phonic REST calls
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Create the shared state.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            http_client: reqwest::Client::new(),
        })
    }
}
