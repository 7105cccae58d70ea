//! Captured output of the serving process.
//!
//! The serving process logs one line per handled request. The reader tasks
//! feed those lines into a bounded ring buffer (the source of `last_error`
//! text) and bump the shared activity stamp, which is the watchdog's idle
//! signal. The stamp is the only state these tasks write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;

const DEFAULT_MAX_LINES: usize = 1_000;

/// Ring buffer over the serving process's combined stdout/stderr lines.
pub struct CaptureBuffer {
    max_lines: usize,
    lines: RwLock<Vec<String>>,
}

impl CaptureBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            lines: RwLock::new(Vec::new()),
        }
    }

    /// Append a line, trimming oldest if over capacity.
    pub fn push(&self, line: String) {
        let mut lines = self.lines.write().expect("CaptureBuffer lock poisoned");
        lines.push(line);
        if lines.len() > self.max_lines {
            let excess = lines.len() - self.max_lines;
            lines.drain(..excess);
        }
    }

    /// Return the last `n` lines (or all if `n` exceeds stored count).
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.read().expect("CaptureBuffer lock poisoned");
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }

    pub fn clear(&self) {
        self.lines.write().expect("CaptureBuffer lock poisoned").clear();
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

/// Monotonic last-access stamp, safe to bump from the reader tasks while the
/// control plane reads it. Never moves backwards.
pub struct ActivityStamp {
    epoch: Instant,
    touched_millis: AtomicU64,
}

impl ActivityStamp {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            touched_millis: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.touched_millis.fetch_max(now, Ordering::Relaxed);
    }

    /// Time since the last touch.
    pub fn elapsed(&self) -> Duration {
        let touched = Duration::from_millis(self.touched_millis.load(Ordering::Relaxed));
        self.epoch.elapsed().saturating_sub(touched)
    }
}

impl Default for ActivityStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the child's stdout/stderr into the capture buffer, bumping the
/// activity stamp once per captured line.
pub fn spawn_line_readers(child: &mut Child, capture: &Arc<CaptureBuffer>, activity: &Arc<ActivityStamp>) {
    if let Some(stdout) = child.stdout.take() {
        let capture = Arc::clone(capture);
        let activity = Arc::clone(activity);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                capture.push(line);
                activity.touch();
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let capture = Arc::clone(capture);
        let activity = Arc::clone(activity);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                capture.push(line);
                activity.touch();
            }
        });
    }
}
