//! Ingestion routes: local path or multipart upload.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::{bad_request, ApiError, ApiResult};
use crate::state::AppState;
use docsage_ingest::IngestReport;

/// Uploaded PDFs are held in memory while they are processed.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingest", post(ingest_path))
        .route(
            "/ingest/upload",
            post(ingest_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    path: PathBuf,
}

/// POST /api/ingest: ingest a PDF already on this machine.
async fn ingest_path(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<IngestReport> {
    info!("Ingesting {}", req.path.display());
    Ok(Json(state.ingest_file(&req.path).await?))
}

/// POST /api/ingest/upload: ingest every uploaded file field.
async fn ingest_upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut reports = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {}", e)),
        };
        let Some(filename) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => return bad_request(format!("Failed to read {}: {}", filename, e)),
        };

        info!("Ingesting upload {} ({} bytes)", filename, bytes.len());
        match state.ingest_bytes(&bytes, &filename).await {
            Ok(report) => reports.push(report),
            Err(e) => return ApiError(e).into_response(),
        }
    }

    if reports.is_empty() {
        return bad_request("No file in upload");
    }
    Json(serde_json::json!({ "ingested": reports })).into_response()
}

/// Keep only the final path component and safe characters.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') { c } else { '_' })
        .collect();
    if cleaned.trim().is_empty() {
        "upload.pdf".into()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn multipart_request(filename: &str, content: &[u8]) -> Request<Body> {
        let boundary = "docsage-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n",
                b = boundary,
                f = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/ingest/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\q3 (final).pdf"), "q3 _final_.pdf");
        assert_eq!(sanitize_filename(""), "upload.pdf");
    }

    #[tokio::test]
    async fn test_ingest_without_key_is_unavailable() {
        let (state, _dir) = test_state();
        let (status, body) = send(
            &state,
            json_request("POST", "/api/ingest", serde_json::json!({"path": "/tmp/x.pdf"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn test_invalid_documents_are_bad_requests() {
        let (state, _dir) = test_state();
        state.llm_config.write().groq_api_key = Some("gsk-test".into());

        let (status, _) = send(
            &state,
            json_request("POST", "/api/ingest", serde_json::json!({"path": "/nonexistent/x.pdf"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&state, multipart_request("notes.pdf", b"plain text, not a pdf")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("notes.pdf"));
        assert_eq!(state.index.count().unwrap(), 0);
    }
}
