//! Control-plane state and wire types.

use crate::settings::ShareSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of the managed share.
///
/// Legal transitions: Stopped -> Starting -> Running, Running -> Stopping ->
/// Stopped (explicit stop or crash reconciliation), Starting -> Failed (port
/// conflict or spawn failure). Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareState {
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Start attempt failed (check `last_error`)
    Failed,
}

impl ShareState {
    pub fn is_running(&self) -> bool {
        matches!(self, ShareState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ShareState::Stopped | ShareState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareState::Starting => "starting",
            ShareState::Running => "running",
            ShareState::Stopping => "stopping",
            ShareState::Stopped => "stopped",
            ShareState::Failed => "failed",
        }
    }
}

/// Outcome of a `start` request. Failures carry no payload here; the detail
/// lands in the supervisor's `last_error` slot and travels via status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed,
}

/// Fully resolved invocation of the serving process.
#[derive(Debug, Clone)]
pub struct ServeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Port the process will bind; pre-probed before spawning
    pub port: u16,
    /// Directory recorded into history on a successful start
    pub directory: PathBuf,
    pub idle_timeout_secs: u64,
}

impl ServeCommand {
    /// Build the subprocess invocation for the current settings. Boolean
    /// flags appear only when set.
    pub fn from_settings(settings: &ShareSettings) -> anyhow::Result<Self> {
        let program = std::env::current_exe()?;

        let mut args = vec![
            "serve".to_string(),
            settings.directory.display().to_string(),
            "--port".to_string(),
            settings.port.to_string(),
            "--timeout".to_string(),
            settings.idle_timeout_secs.to_string(),
        ];
        if settings.uploads_enabled {
            args.push("--enable-uploads".to_string());
        }
        if settings.thumbnails_disabled {
            args.push("--disable-thumbnails".to_string());
        }

        Ok(Self {
            program,
            args,
            port: settings.port,
            directory: settings.directory.clone(),
            idle_timeout_secs: settings.idle_timeout_secs,
        })
    }
}

/// Point-in-time snapshot handed to the UI consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareStatus {
    pub running: bool,
    pub directory: PathBuf,
    pub port: u16,
    pub timeout: u64,
    pub uploads_enabled: bool,
    pub thumbnails_disabled: bool,
    pub history: Vec<PathBuf>,
    pub ip_address: Option<String>,
    pub accepted_warning: bool,
    pub error: Option<String>,
}

/// Partial update: recognized fields apply independently, anything else is
/// ignored. The running toggle is always applied last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnails_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
}
