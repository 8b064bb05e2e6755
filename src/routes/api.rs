use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voices;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voices", get(voices::list_voices))
        .layer(TraceLayer::new_for_http())
}
