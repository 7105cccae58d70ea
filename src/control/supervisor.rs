//! Lifecycle owner of the serving process.
//!
//! All `ServiceState` mutation happens behind one async mutex, so control
//! operations observe each other fully serialized: two concurrent `start`
//! calls cannot interleave, and the watchdog cannot race a manual stop.
//! Failures never cross this boundary as errors; they land in the single
//! `last_error` slot and surface through status queries.

use super::capture::{spawn_line_readers, ActivityStamp, CaptureBuffer};
use super::state::{ServeCommand, ShareState, StartOutcome};
use crate::error::ShareError;
use crate::settings::SettingsStore;
use std::net::{Ipv4Addr, TcpListener};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How long a fresh process gets to fail loudly before we call it started.
const DEFAULT_START_GRACE: Duration = Duration::from_secs(2);
/// How long a stopping process gets to exit after SIGTERM before SIGKILL.
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);
/// Lines of captured output recovered into `last_error`.
const ERROR_TAIL_LINES: usize = 4;

struct ServiceState {
    share: ShareState,
    process: Option<Child>,
    last_error: Option<String>,
    started_at: Option<Instant>,
    idle_timeout: Duration,
}

pub struct ShareSupervisor {
    state: Mutex<ServiceState>,
    capture: Arc<CaptureBuffer>,
    activity: Arc<ActivityStamp>,
    start_grace: Duration,
    stop_grace: Duration,
}

impl ShareSupervisor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState {
                share: ShareState::Stopped,
                process: None,
                last_error: None,
                started_at: None,
                idle_timeout: Duration::ZERO,
            }),
            capture: Arc::new(CaptureBuffer::default()),
            activity: Arc::new(ActivityStamp::new()),
            start_grace: DEFAULT_START_GRACE,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    pub fn with_start_grace(mut self, grace: Duration) -> Self {
        self.start_grace = grace;
        self
    }

    pub fn capture(&self) -> &Arc<CaptureBuffer> {
        &self.capture
    }

    pub fn activity(&self) -> &Arc<ActivityStamp> {
        &self.activity
    }

    /// Start the serving process. No-op when already running; a port
    /// conflict or early failure leaves the supervisor stopped with the
    /// detail in `last_error` and nothing (left) spawned.
    pub async fn start(&self, cmd: &ServeCommand, settings: &SettingsStore) -> StartOutcome {
        let mut state = self.state.lock().await;

        if state.share.is_running() {
            debug!("Share already running, ignoring start");
            return StartOutcome::AlreadyRunning;
        }

        state.share = ShareState::Starting;
        state.last_error = None;
        self.capture.clear();

        if let Err(err) = probe_port(cmd.port) {
            warn!(port = cmd.port, "Refusing to start: {err}");
            state.share = ShareState::Failed;
            state.last_error = Some(err.to_string());
            return StartOutcome::Failed;
        }

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn serving process: {e}");
                state.share = ShareState::Failed;
                state.last_error = Some(ShareError::SpawnFailed(e.to_string()).to_string());
                return StartOutcome::Failed;
            }
        };

        info!(pid = ?child.id(), port = cmd.port, "Spawned serving process");
        spawn_line_readers(&mut child, &self.capture, &self.activity);

        match tokio::time::timeout(self.start_grace, child.wait()).await {
            Ok(exit) => {
                // The reader tasks need a beat to drain the exit output.
                tokio::time::sleep(Duration::from_millis(50)).await;
                let detail = self.failure_detail(exit);
                error!(port = cmd.port, "Serving process failed during startup: {detail}");
                state.share = ShareState::Failed;
                state.last_error = Some(ShareError::SpawnFailed(detail).to_string());
                StartOutcome::Failed
            }
            Err(_) => {
                state.process = Some(child);
                state.share = ShareState::Running;
                state.started_at = Some(Instant::now());
                state.idle_timeout = Duration::from_secs(cmd.idle_timeout_secs);
                self.activity.touch();
                if let Err(e) = settings.record_directory(&cmd.directory) {
                    warn!("Failed to record directory history: {e}");
                }
                info!(directory = %cmd.directory.display(), port = cmd.port, "Share started");
                StartOutcome::Started
            }
        }
    }

    /// Stop the serving process. Idempotent and safe to call during
    /// shutdown even if the process already exited on its own.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;

        if state.share.is_stopped() {
            debug!("Share already stopped, ignoring stop");
            return;
        }

        state.share = ShareState::Stopping;

        if let Some(mut child) = state.process.take() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    unsafe {
                        libc::kill(pid as i32, libc::SIGTERM);
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }

            match tokio::time::timeout(self.stop_grace, child.wait()).await {
                Ok(_) => debug!("Serving process exited"),
                Err(_) => {
                    warn!("Serving process did not exit in time, killing");
                    let _ = child.kill().await;
                }
            }
        }

        state.share = ShareState::Stopped;
        state.started_at = None;
        info!("Share stopped");
    }

    /// Whether a process is currently supervised.
    pub async fn has_process(&self) -> bool {
        self.state.lock().await.process.is_some()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.share.is_running()
    }

    pub async fn state(&self) -> ShareState {
        self.state.lock().await.share
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub async fn uptime(&self) -> Option<Duration> {
        self.state.lock().await.started_at.map(|t| t.elapsed())
    }

    /// Check whether the supervised process exited on its own.
    pub async fn check_exited(&self) -> Option<ExitStatus> {
        let mut state = self.state.lock().await;
        let child = state.process.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to poll serving process: {e}");
                None
            }
        }
    }

    /// Record a crash observed by the watchdog. A clean exit stays silent;
    /// a non-zero exit recovers the captured output tail into `last_error`.
    pub async fn note_crash(&self, status: ExitStatus) {
        if status.success() {
            return;
        }
        // The reader tasks need a beat to drain the exit output.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tail = self.capture.tail(ERROR_TAIL_LINES).join("\n");
        let detail = if tail.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {tail}")
        };
        let mut state = self.state.lock().await;
        state.last_error = Some(ShareError::ProcessCrash(detail).to_string());
    }

    /// Time the share has been idle beyond its timeout, if it is running
    /// with a non-zero timeout and has exceeded it.
    pub async fn idle_excess(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        if !state.share.is_running() || state.idle_timeout.is_zero() {
            return None;
        }
        let idle = self.activity.elapsed();
        (idle > state.idle_timeout).then_some(idle)
    }

    fn failure_detail(&self, exit: std::io::Result<ExitStatus>) -> String {
        let tail = self.capture.tail(ERROR_TAIL_LINES).join("\n");
        if !tail.is_empty() {
            return tail;
        }
        match exit {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

impl Default for ShareSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether the chosen port is already bound by another process.
fn probe_port(port: u16) -> crate::error::Result<()> {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => Err(ShareError::PortInUse(port)),
        Err(e) => Err(ShareError::Io(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_settings(dir: &TempDir) -> SettingsStore {
        SettingsStore::open_at(dir.path().join("settings.toml")).unwrap()
    }

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    fn shell_command(script: &str, port: u16, directory: &str) -> ServeCommand {
        ServeCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            port,
            directory: PathBuf::from(directory),
            idle_timeout_secs: 0,
        }
    }

    fn sleeper(port: u16, directory: &str) -> ServeCommand {
        shell_command("sleep 30", port, directory)
    }

    fn fast_supervisor() -> ShareSupervisor {
        ShareSupervisor::new().with_start_grace(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn start_twice_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = fast_supervisor();
        let cmd = sleeper(free_port(), "/srv/a");

        assert_eq!(supervisor.start(&cmd, &settings).await, StartOutcome::Started);
        assert_eq!(
            supervisor.start(&cmd, &settings).await,
            StartOutcome::AlreadyRunning
        );
        assert!(supervisor.is_running().await);

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = fast_supervisor();

        // Safe before any start.
        supervisor.stop().await;
        assert!(!supervisor.is_running().await);

        let cmd = sleeper(free_port(), "/srv/a");
        supervisor.start(&cmd, &settings).await;
        supervisor.stop().await;
        supervisor.stop().await;
        assert!(!supervisor.is_running().await);
        assert!(supervisor.last_error().await.is_none());
    }

    #[tokio::test]
    async fn occupied_port_fails_without_spawning() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = fast_supervisor();

        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let outcome = supervisor.start(&sleeper(port, "/srv/a"), &settings).await;
        assert_eq!(outcome, StartOutcome::Failed);
        assert!(!supervisor.is_running().await);
        assert!(!supervisor.has_process().await);
        let err = supervisor.last_error().await.unwrap();
        assert!(err.contains("already in use"), "unexpected error: {err}");
        // A failed start never lands in history.
        assert!(settings.snapshot().history.is_empty());
    }

    #[tokio::test]
    async fn early_exit_is_captured_as_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = ShareSupervisor::new().with_start_grace(Duration::from_millis(500));

        let cmd = shell_command("echo 'bind failed: boom' >&2; exit 1", free_port(), "/srv/a");
        let outcome = supervisor.start(&cmd, &settings).await;

        assert_eq!(outcome, StartOutcome::Failed);
        assert_eq!(supervisor.state().await, ShareState::Failed);
        let err = supervisor.last_error().await.unwrap();
        assert!(err.contains("boom"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn successful_starts_record_history() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = fast_supervisor();

        supervisor.start(&sleeper(free_port(), "/srv/a"), &settings).await;
        supervisor.stop().await;
        supervisor.start(&sleeper(free_port(), "/srv/b"), &settings).await;
        supervisor.stop().await;
        supervisor.start(&sleeper(free_port(), "/srv/a"), &settings).await;
        supervisor.stop().await;

        let history = settings.snapshot().history;
        assert_eq!(history, vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]);
    }

    #[tokio::test]
    async fn start_clears_previous_error() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let supervisor = ShareSupervisor::new().with_start_grace(Duration::from_millis(300));

        supervisor
            .start(&shell_command("exit 1", free_port(), "/srv/a"), &settings)
            .await;
        assert!(supervisor.last_error().await.is_some());

        supervisor.start(&sleeper(free_port(), "/srv/a"), &settings).await;
        assert!(supervisor.last_error().await.is_none());
        supervisor.stop().await;
    }
}
