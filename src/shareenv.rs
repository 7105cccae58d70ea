use std::path::PathBuf;

const LANSHARE_CONFIG_DIR: &str = "LANSHARE_CONFIG_DIR";
const LANSHARE_ASSET_DIR: &str = "LANSHARE_ASSET_DIR";
const LANSHARE_CONTROL_PORT: &str = "LANSHARE_CONTROL_PORT";

const FALLBACK_CONFIG_DIR: &str = "~/.config";
const LANSHARE_SUBDIR: &str = "lanshare";
const DEFAULT_CONTROL_PORT: u16 = 14790;

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Lanshare config directory ($LANSHARE_CONFIG_DIR or ~/.config/lanshare)
pub fn config_dir() -> PathBuf {
    let dir = env_opt(LANSHARE_CONFIG_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_DIR))
                .join(LANSHARE_SUBDIR)
        });
    tracing::trace!(dir = %dir.display(), "Resolved config directory");
    dir
}

/// Settings file path (config_dir/settings.toml)
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

/// Root of the installed web assets and certificates
/// ($LANSHARE_ASSET_DIR or the executable's directory)
pub fn asset_root() -> PathBuf {
    let dir = env_opt(LANSHARE_ASSET_DIR)
        .map(PathBuf::from)
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."));
    tracing::trace!(dir = %dir.display(), "Resolved asset root");
    dir
}

/// Static frontend directory served outside the /api prefix
pub fn web_dir() -> PathBuf {
    asset_root().join("web")
}

/// Pre-provisioned TLS certificate path
pub fn tls_cert_path() -> PathBuf {
    asset_root().join("certs").join("lanshare_cert.pem")
}

/// Pre-provisioned TLS key path
pub fn tls_key_path() -> PathBuf {
    asset_root().join("certs").join("lanshare_key.pem")
}

/// Loopback port of the control surface ($LANSHARE_CONTROL_PORT or 14790)
pub fn control_port() -> u16 {
    env_opt(LANSHARE_CONTROL_PORT)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CONTROL_PORT)
}
