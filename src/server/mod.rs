//! The serving process: the HTTP(S) face of the share.
//!
//! Spawned by the supervisor as `lanshare serve <dir> --port N --timeout T
//! [--enable-uploads] [--disable-thumbnails]` and killed by it at will; it
//! holds no state worth preserving beyond in-flight upload temp files,
//! which are swept on graceful shutdown.

pub mod activity;
pub mod browse;
pub mod download;
pub mod upload;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Upload chunks beyond this size are rejected.
const UPLOAD_CHUNK_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub directory: PathBuf,
    pub port: u16,
    pub idle_timeout_secs: u64,
    pub uploads_enabled: bool,
    pub thumbnails_disabled: bool,
}

pub struct AppState {
    pub share_root: PathBuf,
    pub uploads_enabled: bool,
    pub thumbnails_disabled: bool,
    /// In-flight upload temp files, keyed by declared checksum
    pub upload_jobs: Mutex<HashMap<String, PathBuf>>,
}

impl AppState {
    fn new(opts: &ServeOptions) -> Self {
        Self {
            share_root: opts.directory.clone(),
            uploads_enabled: opts.uploads_enabled,
            thumbnails_disabled: opts.thumbnails_disabled,
            upload_jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Remove temp files of uploads that never completed.
    pub async fn cleanup_uploads(&self) {
        let mut jobs = self.upload_jobs.lock().await;
        for (checksum, path) in jobs.drain() {
            if path.exists() {
                info!(checksum = %checksum, path = %path.display(), "Removing incomplete upload");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove incomplete upload: {e}");
                }
            }
        }
    }
}

pub fn router(state: Arc<AppState>, web_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/browse", get(browse::root))
        .route("/api/browse/", get(browse::root))
        .route("/api/browse/{*path}", get(browse::subtree))
        .route("/api/download/{*path}", get(download::fetch))
        .route(
            "/api/upload",
            post(upload::receive).layer(DefaultBodyLimit::max(UPLOAD_CHUNK_LIMIT)),
        )
        .route("/api/cancel-upload", post(upload::cancel))
        .fallback_service(ServeDir::new(web_dir))
        .layer(axum::middleware::from_fn(activity::track_request))
        .with_state(state)
}

/// Serve the share until terminated by the supervisor.
pub async fn run(opts: ServeOptions) -> Result<()> {
    anyhow::ensure!(
        opts.directory.is_dir(),
        "share directory {} does not exist",
        opts.directory.display()
    );

    let state = Arc::new(AppState::new(&opts));
    let app = router(Arc::clone(&state), crate::shareenv::web_dir());
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));

    info!(
        directory = %opts.directory.display(),
        port = opts.port,
        idle_timeout_secs = opts.idle_timeout_secs,
        uploads = opts.uploads_enabled,
        thumbnails_disabled = opts.thumbnails_disabled,
        "Serving share"
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let cert = crate::shareenv::tls_cert_path();
    let key = crate::shareenv::tls_key_path();
    if cert.exists() && key.exists() {
        let tls = RustlsConfig::from_pem_file(&cert, &key)
            .await
            .with_context(|| format!("Failed to load TLS certificates from {}", cert.display()))?;
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        warn!("TLS certificates not found, serving plain HTTP");
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    }

    state.cleanup_uploads().await;
    info!("Serving process stopped");
    Ok(())
}

async fn graceful_shutdown(handle: Handle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }

    info!("Termination signal received, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}
