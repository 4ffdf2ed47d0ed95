// POST /upload: validate, allocate a session, run the chain, persist
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::session::{RESULT_RECORD_NAME, RESULT_TEXT_NAME, SOURCE_NAME};

use super::AppState;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ACCEPTED_CONTENT_TYPES: &[&str] =
    &["application/pdf", "application/x-pdf", "application/octet-stream"];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub text: String,
    pub text_id: String,
    pub download_url: String,
}

/// One file per request in the multipart field `file`. Media-type and size
/// rejections happen before any session or workspace exists. The uploaded
/// filename is never used in a path; artifacts live under fixed logical
/// names inside the session workspace.
pub async fn handle(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let limit = state.config.max_upload_bytes;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_err(e, limit))?
    {
        if field.name() == Some("file") {
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| multipart_err(e, limit))?;
            file = Some((content_type, data));
            break;
        }
    }
    let (content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    // Declared and actual type must both look like PDF.
    if let Some(ct) = content_type.as_deref() {
        let base = ct.split(';').next().unwrap_or(ct).trim();
        if !ACCEPTED_CONTENT_TYPES.contains(&base) {
            return Err(ApiError::UnsupportedMediaType);
        }
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(ApiError::UnsupportedMediaType);
    }
    if data.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge {
            limit: state.config.max_upload_bytes,
        });
    }

    let session = state.store.create_session()?;
    info!(session = %session.id, bytes = data.len(), "accepted upload");

    if let Err(e) = state.store.write_artifact(&session.id, SOURCE_NAME, &data) {
        state.store.purge(&session.id);
        return Err(e.into());
    }

    let doc = Arc::new(data.to_vec());
    let deadline = Duration::from_secs(state.config.request_timeout_secs);
    let result = match tokio::time::timeout(
        deadline,
        state.chain.run(doc, session.workspace.clone()),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(session = %session.id, "extraction exceeded the request deadline");
            state.store.purge(&session.id);
            return Err(ApiError::ExtractionFailed("extraction timed out".to_string()));
        }
    };

    if !result.success {
        let detail = result
            .error
            .unwrap_or_else(|| "no engine produced sufficient text".to_string());
        state.store.purge(&session.id);
        return Err(ApiError::ExtractionFailed(detail));
    }

    let record = serde_json::to_vec(&result).map_err(|e| {
        warn!(session = %session.id, "could not serialize result record: {e}");
        ApiError::Internal
    })?;
    let persisted = state
        .store
        .write_artifact(&session.id, RESULT_TEXT_NAME, result.text.as_bytes())
        .and_then(|_| state.store.write_artifact(&session.id, RESULT_RECORD_NAME, &record))
        .and_then(|_| state.store.set_result(&session.id));
    if let Err(e) = persisted {
        state.store.purge(&session.id);
        return Err(e.into());
    }

    info!(
        session = %session.id,
        engine = result.engine.unwrap_or("?"),
        pages = result.pages,
        elapsed_ms = result.elapsed_ms,
        "extraction complete"
    );
    Ok(Json(UploadResponse {
        success: true,
        text: result.text,
        text_id: session.id.clone(),
        download_url: format!("/download/{}", session.id),
    }))
}

fn multipart_err(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest("malformed multipart request".to_string())
    }
}
