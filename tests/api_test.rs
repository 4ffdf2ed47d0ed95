// End-to-end tests against the router, in process via tower::oneshot
mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Duration as ChronoDuration;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use textmill::config::AppConfig;
use textmill::extract::{
    DocumentProbe, EngineChain, EngineError, EngineOutput, ExtractionEngine,
};
use textmill::server::{router, AppState};
use textmill::session::SessionStore;

use common::{multipart_body, text_pdf};

const BOUNDARY: &str = "textmill-test-boundary";
const PAGE_TEXT: &str =
    "This is a born digital document. It contains a perfectly normal sentence for testing.";

struct FailingEngine;

impl ExtractionEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }
    fn applies(&self, _probe: &DocumentProbe, _best: Option<&EngineOutput>) -> bool {
        true
    }
    fn extract(&self, _doc: &[u8], _workspace: &Path) -> Result<EngineOutput, EngineError> {
        Err(EngineError::Corrupt("scripted failure".to_string()))
    }
}

struct Harness {
    state: AppState,
    _dir: TempDir,
}

fn harness_with(config: AppConfig, chain: EngineChain, ttl: ChronoDuration) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::new(dir.path(), ttl, ChronoDuration::minutes(5)));
    let state = AppState {
        config: Arc::new(config),
        store,
        chain: Arc::new(chain),
    };
    Harness { state, _dir: dir }
}

fn harness() -> Harness {
    let config = AppConfig::default();
    let chain = EngineChain::with_default_engines(&config);
    harness_with(config, chain, ChronoDuration::minutes(60))
}

fn upload_request(content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(BOUNDARY, content_type, data)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ping_answers_pong() {
    let h = harness();
    let response = router(h.state.clone())
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"pong");
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_without_a_session() {
    let h = harness();
    // PNG bytes renamed to .pdf with a PDF-ish declared type: magic check
    // still rejects it.
    let png = b"\x89PNG\r\n\x1a\n0000";
    let response = router(h.state.clone())
        .oneshot(upload_request("application/pdf", png))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "unsupported_media_type");
    assert_eq!(h.state.store.live_count(), 0, "no session may be created");
}

#[tokio::test]
async fn wrong_declared_type_is_rejected() {
    let h = harness();
    let pdf = text_pdf(&[PAGE_TEXT]);
    let response = router(h.state.clone())
        .oneshot(upload_request("image/png", &pdf))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(h.state.store.live_count(), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_a_workspace() {
    let config = AppConfig {
        max_upload_bytes: 1024,
        ..AppConfig::default()
    };
    let chain = EngineChain::with_default_engines(&config);
    let h = harness_with(config, chain, ChronoDuration::minutes(60));

    let mut big = b"%PDF-1.5\n".to_vec();
    big.resize(4096, b'x');
    let response = router(h.state.clone())
        .oneshot(upload_request("application/pdf", &big))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "payload_too_large");
    assert_eq!(h.state.store.live_count(), 0, "no workspace may be allocated");
}

#[tokio::test]
async fn upload_then_download_round_trip() {
    let h = harness();
    let app = router(h.state.clone());
    let pdf = text_pdf(&[PAGE_TEXT, PAGE_TEXT]);

    let response = app
        .clone()
        .oneshot(upload_request("application/pdf", &pdf))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let text = json["text"].as_str().unwrap().to_string();
    assert!(text.contains("born digital document"), "unexpected text: {text}");
    let download_url = json["download_url"].as_str().unwrap().to_string();
    assert!(download_url.starts_with("/download/"));

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&download_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&bytes), text, "download must match upload text");
}

#[tokio::test]
async fn download_of_unknown_session_is_not_found() {
    let h = harness();
    let response = router(h.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/download/{}", "a".repeat(32)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn download_with_malformed_id_is_invalid_session() {
    let h = harness();
    let response = router(h.state.clone())
        .oneshot(
            Request::builder()
                .uri("/download/not-a-real-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "invalid_session");
}

#[tokio::test]
async fn download_after_ttl_expiry_is_not_found() {
    // Zero TTL: the session expires the moment it is created.
    let config = AppConfig::default();
    let chain = EngineChain::with_default_engines(&config);
    let h = harness_with(config, chain, ChronoDuration::zero());
    let app = router(h.state.clone());

    let pdf = text_pdf(&[PAGE_TEXT]);
    let response = app
        .clone()
        .oneshot(upload_request("application/pdf", &pdf))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let download_url = json["download_url"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&download_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn total_extraction_failure_purges_the_session() {
    let config = AppConfig::default();
    let chain = EngineChain::new(
        vec![Arc::new(FailingEngine)],
        config.min_text_length,
        config.quality_floor,
        Duration::from_secs(config.engine_timeout_secs),
    );
    let h = harness_with(config, chain, ChronoDuration::minutes(60));

    let pdf = text_pdf(&[PAGE_TEXT]);
    let response = router(h.state.clone())
        .oneshot(upload_request("application/pdf", &pdf))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "extraction_failed");
    assert_eq!(h.state.store.live_count(), 0, "failed sessions are purged");
}
