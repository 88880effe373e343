//! Process-level bootstrap configuration for the `discopanel` binary.
//!
//! This is deliberately small: file-based configuration parsing is an
//! external collaborator (§1 Non-goals). What's here is just enough to
//! stand the core up against a real Docker daemon with one default
//! listener, reading the handful of env vars the rest of the core already
//! expects (`CONTROL_PLANE_DATA_DIR` / `HOST_DATA_PATH`, §9).

use std::path::PathBuf;

/// Where Server data directories are rooted, and the port the default
/// proxy Listener binds on.
#[derive(Debug, Clone)]
pub(crate) struct BootstrapConfig {
    pub(crate) data_root: PathBuf,
    pub(crate) default_listener_port: u16,
    pub(crate) control_plane_network: String,
}

impl BootstrapConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            data_root: std::env::var("DISCOPANEL_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/lib/discopanel")),
            default_listener_port: std::env::var("DISCOPANEL_LISTEN_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(25565),
            control_plane_network: std::env::var("DISCOPANEL_NETWORK").unwrap_or_else(|_| "discopanel".to_owned()),
        }
    }
}
