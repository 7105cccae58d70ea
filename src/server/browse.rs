//! Directory listing under `/api/browse`.

use super::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::path::Path as StdPath;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::error;

pub async fn root(State(state): State<Arc<AppState>>) -> Response {
    directory_listing(&state.share_root)
}

pub async fn subtree(State(state): State<Arc<AppState>>, Path(rel): Path<String>) -> Response {
    directory_listing(&state.share_root.join(rel))
}

/// List a directory as `{name: {isdir, size, modified}}`, in listing order.
/// A child that fails to stat is skipped. A target that is not a directory
/// yields an empty 200; callers must not rely on that (see DESIGN.md).
fn directory_listing(path: &StdPath) -> Response {
    if !path.is_dir() {
        return StatusCode::OK.into_response();
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            error!(path = %path.display(), "Failed to read directory: {e}");
            return StatusCode::OK.into_response();
        }
    };

    let mut listing = serde_json::Map::new();
    for entry in entries.flatten() {
        match stat_entry(&entry) {
            Ok((name, value)) => {
                listing.insert(name, value);
            }
            Err(e) => {
                error!(path = %entry.path().display(), "Skipping unreadable entry: {e}");
            }
        }
    }

    Json(serde_json::Value::Object(listing)).into_response()
}

fn stat_entry(entry: &std::fs::DirEntry) -> std::io::Result<(String, serde_json::Value)> {
    let name = entry
        .file_name()
        .into_string()
        .map_err(|name| std::io::Error::other(format!("non-UTF-8 file name {name:?}")))?;

    // Follows symlinks; a broken link errors out here and gets skipped.
    let metadata = std::fs::metadata(entry.path())?;
    let modified = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_err(std::io::Error::other)?
        .as_secs();

    Ok((
        name,
        json!({
            "isdir": metadata.is_dir(),
            "size": metadata.len(),
            "modified": modified,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::{router, AppState, ServeOptions};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn share_app(share: &TempDir) -> axum::Router {
        let state = Arc::new(AppState::new(&ServeOptions {
            directory: share.path().to_path_buf(),
            port: 0,
            idle_timeout_secs: 0,
            uploads_enabled: false,
            thumbnails_disabled: false,
        }));
        router(state, PathBuf::from("/nonexistent-web-assets"))
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn lists_files_and_directories() {
        let share = TempDir::new().unwrap();
        std::fs::write(share.path().join("a.txt"), b"0123456789").unwrap();
        std::fs::create_dir(share.path().join("sub")).unwrap();

        let (status, listing) = get_json(share_app(&share), "/api/browse/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["a.txt"]["isdir"], false);
        assert_eq!(listing["a.txt"]["size"], 10);
        assert!(listing["a.txt"]["modified"].as_u64().unwrap() > 0);
        assert_eq!(listing["sub"]["isdir"], true);
    }

    #[tokio::test]
    async fn lists_subdirectories_by_relative_path() {
        let share = TempDir::new().unwrap();
        std::fs::create_dir(share.path().join("sub")).unwrap();
        std::fs::write(share.path().join("sub").join("inner.txt"), b"xy").unwrap();

        let (status, listing) = get_json(share_app(&share), "/api/browse/sub").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["inner.txt"]["size"], 2);
    }

    #[tokio::test]
    async fn non_directory_target_yields_empty_ok() {
        let share = TempDir::new().unwrap();
        std::fs::write(share.path().join("a.txt"), b"hello").unwrap();

        let app = share_app(&share);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/browse/a.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .is_none());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_symlink_is_skipped_not_fatal() {
        let share = TempDir::new().unwrap();
        std::fs::write(share.path().join("good.txt"), b"ok").unwrap();
        std::os::unix::fs::symlink(
            share.path().join("missing-target"),
            share.path().join("dangling"),
        )
        .unwrap();

        let (status, listing) = get_json(share_app(&share), "/api/browse/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["good.txt"]["size"], 2);
        assert!(listing.get("dangling").is_none());
    }
}
