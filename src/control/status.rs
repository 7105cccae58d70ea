//! Snapshot composition and partial updates for the UI consumer.

use super::state::{ServeCommand, ShareStatus, StatusPatch};
use super::supervisor::ShareSupervisor;
use crate::settings::SettingsStore;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use tracing::warn;

pub struct StatusAggregator {
    settings: Arc<SettingsStore>,
    supervisor: Arc<ShareSupervisor>,
}

impl StatusAggregator {
    pub fn new(settings: Arc<SettingsStore>, supervisor: Arc<ShareSupervisor>) -> Self {
        Self {
            settings,
            supervisor,
        }
    }

    /// Compose a point-in-time snapshot. Never mutates.
    pub async fn status(&self) -> ShareStatus {
        let settings = self.settings.snapshot();
        ShareStatus {
            running: self.supervisor.is_running().await,
            directory: settings.directory,
            port: settings.port,
            timeout: settings.idle_timeout_secs,
            uploads_enabled: settings.uploads_enabled,
            thumbnails_disabled: settings.thumbnails_disabled,
            history: settings.history,
            ip_address: local_ip().map(|ip| ip.to_string()),
            accepted_warning: settings.accepted_warning,
            error: self.supervisor.last_error().await,
        }
    }

    /// Apply each recognized field independently, persisting as it goes;
    /// the running-state toggle is deferred to the supervisor last. Setter
    /// failures are logged and skipped, never raised to the consumer.
    pub async fn apply(&self, patch: StatusPatch) -> ShareStatus {
        if let Some(directory) = patch.directory {
            if let Err(e) = self.settings.set_directory(directory) {
                warn!("Failed to update directory: {e}");
            }
        }
        if let Some(port) = patch.port {
            if let Err(e) = self.settings.set_port(port) {
                warn!("Failed to update port: {e}");
            }
        }
        if let Some(timeout) = patch.timeout {
            if let Err(e) = self.settings.set_idle_timeout_secs(timeout) {
                warn!("Failed to update idle timeout: {e}");
            }
        }
        if let Some(enabled) = patch.uploads_enabled {
            if let Err(e) = self.settings.set_uploads_enabled(enabled) {
                warn!("Failed to update uploads flag: {e}");
            }
        }
        if let Some(disabled) = patch.thumbnails_disabled {
            if let Err(e) = self.settings.set_thumbnails_disabled(disabled) {
                warn!("Failed to update thumbnails flag: {e}");
            }
        }
        if let Some(running) = patch.running {
            self.set_running(running).await;
        }
        self.status().await
    }

    /// Toggle the share. Starting from the running state (and vice versa)
    /// is a no-op; start failures surface through the status error slot.
    pub async fn set_running(&self, enable: bool) {
        if enable == self.supervisor.is_running().await {
            return;
        }
        if enable {
            match ServeCommand::from_settings(&self.settings.snapshot()) {
                Ok(cmd) => {
                    self.supervisor.start(&cmd, &self.settings).await;
                }
                Err(e) => warn!("Failed to resolve serving command: {e}"),
            }
        } else {
            self.supervisor.stop().await;
        }
    }

    pub fn accept_warning(&self) {
        if let Err(e) = self.settings.accept_warning() {
            warn!("Failed to persist warning acknowledgement: {e}");
        }
    }
}

/// Best-effort LAN address discovery. No packet is sent; the connect only
/// selects the outbound interface.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
