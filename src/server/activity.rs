//! Request activity signal.
//!
//! The supervisor treats captured output as share activity: every handled
//! request must produce exactly one log line, or idle detection breaks.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

pub async fn track_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;
    info!(%method, path = %path, status = response.status().as_u16(), "Request handled");
    response
}
