//! Raw file downloads under `/api/download`.

use super::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::error;

/// Stream a file out of the share root. The wildcard segment arrives
/// percent-decoded; it is joined onto the root without containment
/// verification, matching the deployed behavior (see DESIGN.md).
pub async fn fetch(State(state): State<Arc<AppState>>, Path(rel): Path<String>) -> Response {
    let file_path = state.share_root.join(&rel);

    if !file_path.is_file() {
        return not_found_marker();
    }

    match tokio::fs::File::open(&file_path).await {
        Ok(file) => {
            let stream = ReaderStream::new(file);
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(e) => {
            error!(path = %file_path.display(), "Failed to open file: {e}");
            not_found_marker()
        }
    }
}

/// The shipped UI string-matches this exact body on a 200; do not turn it
/// into a 404 without a coordinated frontend release (see DESIGN.md).
fn not_found_marker() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], "File not found").into_response()
}
