// HTTP surface: upload, download, health
pub mod download;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::extract::EngineChain;
use crate::session::SessionStore;

/// Multipart framing overhead allowed on top of the configured file ceiling.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SessionStore>,
    pub chain: Arc<EngineChain>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/upload", post(upload::handle))
        .route("/download/:id", get(download::handle))
        .route("/ping", get(ping))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}
