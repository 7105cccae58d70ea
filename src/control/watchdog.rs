//! Crash and idle reconciliation for the supervised share.

use super::supervisor::ShareSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default poll interval
const DEFAULT_TICK: Duration = Duration::from_secs(5);

/// Periodic task that observes supervisor state and stops the share when
/// the serving process dies on its own or sits idle past its timeout.
///
/// The cancellation token is checked at every suspension point; cancelling
/// it at unload is clean and never an error.
pub struct Watchdog {
    supervisor: Arc<ShareSupervisor>,
    tick: Duration,
    token: CancellationToken,
}

impl Watchdog {
    pub fn new(supervisor: Arc<ShareSupervisor>, token: CancellationToken) -> Self {
        Self {
            supervisor,
            tick: DEFAULT_TICK,
            token,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run the reconciliation loop until the token is cancelled.
    ///
    /// This should be spawned as a background task.
    pub async fn run(self) {
        info!(interval = ?self.tick, "Watchdog started");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("Watchdog cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.tick_once().await;
        }
    }

    async fn tick_once(&self) {
        if !self.supervisor.has_process().await {
            return;
        }

        if let Some(status) = self.supervisor.check_exited().await {
            warn!(%status, "Serving process exited on its own, reconciling");
            self.supervisor.note_crash(status).await;
            self.supervisor.stop().await;
            return;
        }

        if let Some(idle) = self.supervisor.idle_excess().await {
            info!(idle_secs = idle.as_secs(), "Idle timeout exceeded, stopping share");
            self.supervisor.stop().await;
        }
    }
}
