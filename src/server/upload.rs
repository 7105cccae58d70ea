//! Chunked uploads into the share, gated on the uploads flag.
//!
//! Chunks append to a temp file named by the declared SHA-256 checksum;
//! the final chunk triggers verification and an atomic rename onto the
//! target name. Interrupted uploads leave a temp file that `cancel` or
//! the shutdown sweep removes.

use super::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[derive(Deserialize)]
pub struct UploadParams {
    filename: Option<String>,
    path: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelParams {
    filehash: Option<String>,
}

pub async fn receive(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.uploads_enabled {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let offset = match required_header(&headers, "Upload-Offset") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let incomplete = match required_header(&headers, "Upload-Incomplete") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let checksum = match required_header(&headers, "X-File-Checksum") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let filename = match required_param(params.filename, "filename") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let rel_dir = match required_param(params.path, "path") {
        Ok(value) => value,
        Err(response) => return response,
    };

    let target_dir = state.share_root.join(rel_dir.trim_start_matches('/'));
    if !target_dir.is_dir() {
        return (
            StatusCode::BAD_REQUEST,
            format!("directory path {} does not exist", target_dir.display()),
        )
            .into_response();
    }

    let temp_path = target_dir.join(&checksum);

    let write_result = if offset == "0" {
        state
            .upload_jobs
            .lock()
            .await
            .insert(checksum.clone(), temp_path.clone());
        tokio::fs::write(&temp_path, &body).await
    } else {
        append_chunk(&temp_path, &body).await
    };
    if let Err(e) = write_result {
        error!(path = %temp_path.display(), "Failed to write upload chunk: {e}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    if incomplete == "false" {
        match file_sha256_hex(&temp_path).await {
            Ok(actual) if actual == checksum => {}
            Ok(actual) => {
                error!(expected = %checksum, actual = %actual, "Upload checksum mismatch");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            Err(e) => {
                error!("Failed to hash uploaded file: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }

        let final_path = target_dir.join(&filename);
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            error!(path = %final_path.display(), "Failed to move upload into place: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        state.upload_jobs.lock().await.remove(&checksum);
        info!(path = %final_path.display(), "Upload complete");
    }

    StatusCode::OK.into_response()
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CancelParams>,
) -> Response {
    if !state.uploads_enabled {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let filehash = match required_param(params.filehash, "filehash") {
        Ok(value) => value,
        Err(response) => return response,
    };

    if let Some(path) = state.upload_jobs.lock().await.remove(&filehash) {
        info!(path = %path.display(), "Cancelling upload");
        if let Err(e) = tokio::fs::remove_file(&path).await {
            error!("Failed to remove cancelled upload: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    StatusCode::OK.into_response()
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, Response> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| missing(name))
}

fn required_param(value: Option<String>, name: &str) -> Result<String, Response> {
    value.filter(|value| !value.is_empty()).ok_or_else(|| missing(name))
}

fn missing(name: &str) -> Response {
    (StatusCode::BAD_REQUEST, format!("missing param: {name}")).into_response()
}

async fn append_chunk(path: &Path, chunk: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await?;
    file.write_all(chunk).await?;
    file.flush().await
}

async fn file_sha256_hex(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::super::{router, AppState, ServeOptions};
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn share_app(share: &TempDir, uploads_enabled: bool) -> (axum::Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(&ServeOptions {
            directory: share.path().to_path_buf(),
            port: 0,
            idle_timeout_secs: 0,
            uploads_enabled,
            thumbnails_disabled: false,
        }));
        let app = router(Arc::clone(&state), PathBuf::from("/nonexistent-web-assets"));
        (app, state)
    }

    fn sha256_hex(data: &[u8]) -> String {
        Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
    }

    fn chunk_request(
        chunk: &[u8],
        offset: usize,
        incomplete: bool,
        checksum: &str,
        filename: &str,
    ) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/upload?filename={filename}&path=%2F"))
            .header("Upload-Offset", offset.to_string())
            .header("Upload-Incomplete", if incomplete { "true" } else { "false" })
            .header("X-File-Checksum", checksum)
            .body(Body::from(chunk.to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn uploads_disabled_is_unauthorized() {
        let share = TempDir::new().unwrap();
        let (app, _) = share_app(&share, false);

        let response = app
            .oneshot(chunk_request(b"data", 0, false, "abc", "f.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_is_bad_request() {
        let share = TempDir::new().unwrap();
        let (app, _) = share_app(&share, true);

        let request = Request::builder()
            .method("POST")
            .uri("/api/upload?filename=f.txt&path=%2F")
            .header("Upload-Offset", "0")
            .header("Upload-Incomplete", "false")
            .body(Body::from("data"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "missing param: X-File-Checksum".as_bytes());
    }

    #[tokio::test]
    async fn single_chunk_upload_verifies_and_renames() {
        let share = TempDir::new().unwrap();
        let (app, state) = share_app(&share, true);

        let payload = b"the whole file";
        let checksum = sha256_hex(payload);
        let response = app
            .oneshot(chunk_request(payload, 0, false, &checksum, "whole.txt"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let stored = std::fs::read(share.path().join("whole.txt")).unwrap();
        assert_eq!(stored, payload);
        assert!(!share.path().join(&checksum).exists());
        assert!(state.upload_jobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn chunks_append_until_final_one() {
        let share = TempDir::new().unwrap();
        let (app, _) = share_app(&share, true);

        let payload = b"first halfsecond half";
        let checksum = sha256_hex(payload);

        let response = app
            .clone()
            .oneshot(chunk_request(b"first half", 0, true, &checksum, "joined.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // The partial upload parks under its checksum name.
        assert!(share.path().join(&checksum).exists());

        let response = app
            .oneshot(chunk_request(b"second half", 10, false, &checksum, "joined.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = std::fs::read(share.path().join("joined.txt")).unwrap();
        assert_eq!(stored, payload);
    }

    #[tokio::test]
    async fn checksum_mismatch_rejects_upload() {
        let share = TempDir::new().unwrap();
        let (app, _) = share_app(&share, true);

        let response = app
            .oneshot(chunk_request(b"tampered", 0, false, &sha256_hex(b"original"), "f.txt"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!share.path().join("f.txt").exists());
    }

    #[tokio::test]
    async fn cancel_removes_parked_chunks() {
        let share = TempDir::new().unwrap();
        let (app, state) = share_app(&share, true);

        let checksum = sha256_hex(b"never finished");
        app.clone()
            .oneshot(chunk_request(b"never", 0, true, &checksum, "f.txt"))
            .await
            .unwrap();
        assert!(share.path().join(&checksum).exists());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/cancel-upload?filehash={checksum}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!share.path().join(&checksum).exists());
        assert!(state.upload_jobs.lock().await.is_empty());
    }
}
