// GET /download/{id}: stream the persisted extraction as an attachment
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::error::ApiError;
use crate::session::RESULT_TEXT_NAME;

use super::AppState;

/// Resolves a session identifier to its persisted text. Reads never purge;
/// a completed download only marks the session for early reclamation by the
/// reaper.
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state.store.get(&id)?;
    if !state.store.has_result(&session.id) {
        return Err(ApiError::NotFound);
    }

    let data = {
        let store = state.store.clone();
        let id = session.id.clone();
        tokio::task::spawn_blocking(move || store.read_artifact(&id, RESULT_TEXT_NAME))
            .await
            .map_err(|_| ApiError::Internal)?
            .map_err(ApiError::from)?
    };

    state.store.mark_downloaded(&session.id);
    info!(session = %session.id, bytes = data.len(), "served download");

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"extracted_text.txt\"",
        ),
    ];
    Ok((headers, data).into_response())
}
