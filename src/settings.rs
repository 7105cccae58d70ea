//! Durable share settings with commit-on-write semantics.
//!
//! Every setter persists immediately; a crash never loses an acknowledged
//! change. The store is the single owner of the settings file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Most-recent-first shared-directory history, bounded at this many entries.
pub const HISTORY_LIMIT: usize = 10;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    /// Directory exposed by the share
    pub directory: PathBuf,
    /// Port the serving process binds
    pub port: u16,
    /// Seconds of inactivity before the watchdog stops the share (0 = never)
    pub idle_timeout_secs: u64,
    pub uploads_enabled: bool,
    pub thumbnails_disabled: bool,
    /// Whether the operator has acknowledged the open-network warning
    pub accepted_warning: bool,
    /// Previously shared directories, most recent first, no duplicates
    pub history: Vec<PathBuf>,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            directory: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
            port: DEFAULT_PORT,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            uploads_enabled: false,
            thumbnails_disabled: false,
            accepted_warning: false,
            history: Vec::new(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    inner: RwLock<ShareSettings>,
}

impl SettingsStore {
    /// Open the store at the default location, creating defaults if absent.
    pub fn open() -> Result<Self> {
        Self::open_at(crate::shareenv::settings_path())
    }

    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        tracing::trace!(path = %path.display(), "Loading share settings");

        let settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse settings from {}", path.display()))?
        } else {
            tracing::trace!("Settings file does not exist, using defaults");
            ShareSettings::default()
        };

        Ok(Self {
            path,
            inner: RwLock::new(settings),
        })
    }

    /// A point-in-time copy of the full settings.
    pub fn snapshot(&self) -> ShareSettings {
        self.inner.read().expect("settings lock poisoned").clone()
    }

    pub fn directory(&self) -> PathBuf {
        self.inner.read().expect("settings lock poisoned").directory.clone()
    }

    pub fn set_directory(&self, directory: impl Into<PathBuf>) -> Result<()> {
        self.mutate(|s| s.directory = directory.into())
    }

    pub fn port(&self) -> u16 {
        self.inner.read().expect("settings lock poisoned").port
    }

    pub fn set_port(&self, port: u16) -> Result<()> {
        if port == 0 {
            bail!(crate::ShareError::InvalidPort);
        }
        self.mutate(|s| s.port = port)
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.inner.read().expect("settings lock poisoned").idle_timeout_secs
    }

    pub fn set_idle_timeout_secs(&self, secs: u64) -> Result<()> {
        self.mutate(|s| s.idle_timeout_secs = secs)
    }

    pub fn set_uploads_enabled(&self, enabled: bool) -> Result<()> {
        self.mutate(|s| s.uploads_enabled = enabled)
    }

    pub fn set_thumbnails_disabled(&self, disabled: bool) -> Result<()> {
        self.mutate(|s| s.thumbnails_disabled = disabled)
    }

    pub fn accept_warning(&self) -> Result<()> {
        tracing::info!("Operator accepted the open-network warning");
        self.mutate(|s| s.accepted_warning = true)
    }

    /// Record a successfully shared directory: deduplicated, most recent
    /// first, bounded at [`HISTORY_LIMIT`] entries.
    pub fn record_directory(&self, directory: &Path) -> Result<()> {
        self.mutate(|s| {
            s.history.retain(|p| p != directory);
            s.history.insert(0, directory.to_path_buf());
            s.history.truncate(HISTORY_LIMIT);
        })
    }

    fn mutate(&self, apply: impl FnOnce(&mut ShareSettings)) -> Result<()> {
        let mut settings = self.inner.write().expect("settings lock poisoned");
        apply(&mut settings);
        self.commit(&settings)
    }

    fn commit(&self, settings: &ShareSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let content =
            toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;

        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;

        tracing::trace!(path = %self.path.display(), "Share settings committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::open_at(dir.path().join("settings.toml")).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let settings = store.snapshot();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS);
        assert!(!settings.accepted_warning);
        assert!(settings.history.is_empty());
    }

    #[test]
    fn setters_persist_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let store = SettingsStore::open_at(&path).unwrap();

        store.set_port(9090).unwrap();
        store.set_directory("/srv/share").unwrap();
        store.set_uploads_enabled(true).unwrap();
        store.accept_warning().unwrap();

        // Re-open from disk: every change must already be committed.
        let reopened = SettingsStore::open_at(&path).unwrap();
        let settings = reopened.snapshot();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.directory, PathBuf::from("/srv/share"));
        assert!(settings.uploads_enabled);
        assert!(settings.accepted_warning);
    }

    #[test]
    fn port_zero_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.set_port(0).is_err());
        assert_eq!(store.port(), DEFAULT_PORT);
    }

    #[test]
    fn history_dedups_and_moves_to_front() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.record_directory(Path::new("/a")).unwrap();
        store.record_directory(Path::new("/b")).unwrap();
        store.record_directory(Path::new("/a")).unwrap();

        let history = store.snapshot().history;
        assert_eq!(history, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn history_is_bounded_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for i in 0..15 {
            store.record_directory(&PathBuf::from(format!("/d{i}"))).unwrap();
        }

        let history = store.snapshot().history;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0], PathBuf::from("/d14"));
        assert_eq!(history[HISTORY_LIMIT - 1], PathBuf::from("/d5"));
    }
}
