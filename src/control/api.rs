//! Loopback control surface for the operator CLI/UI.
//!
//! Supervisor failures never become HTTP errors here; they ride inside the
//! status snapshot.

use super::state::{ShareStatus, StatusPatch};
use super::status::StatusAggregator;
use super::supervisor::ShareSupervisor;
use super::watchdog::Watchdog;
use crate::settings::SettingsStore;
use anyhow::Result;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Run the control plane in the foreground until interrupted.
pub async fn run(control_port: u16) -> Result<()> {
    let settings = Arc::new(SettingsStore::open()?);
    let supervisor = Arc::new(ShareSupervisor::new());
    let aggregator = Arc::new(StatusAggregator::new(
        Arc::clone(&settings),
        Arc::clone(&supervisor),
    ));

    let token = CancellationToken::new();
    let watchdog = Watchdog::new(Arc::clone(&supervisor), token.clone());
    let watchdog_task = tokio::spawn(watchdog.run());

    let addr = SocketAddr::from(([127, 0, 0, 1], control_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control surface listening on {addr}");

    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Watchdog first, then the served process: the watchdog must not race
    // the final stop.
    token.cancel();
    let _ = watchdog_task.await;
    supervisor.stop().await;
    info!("Control plane stopped");
    Ok(())
}

pub fn router(aggregator: Arc<StatusAggregator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/control/status", get(get_status).post(set_status))
        .route("/control/accept-warning", post(accept_warning))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(aggregator)
}

async fn get_status(State(aggregator): State<Arc<StatusAggregator>>) -> Json<ShareStatus> {
    Json(aggregator.status().await)
}

async fn set_status(
    State(aggregator): State<Arc<StatusAggregator>>,
    Json(patch): Json<StatusPatch>,
) -> Json<ShareStatus> {
    Json(aggregator.apply(patch).await)
}

async fn accept_warning(State(aggregator): State<Arc<StatusAggregator>>) -> Json<ShareStatus> {
    aggregator.accept_warning();
    Json(aggregator.status().await)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C");
    }
}
