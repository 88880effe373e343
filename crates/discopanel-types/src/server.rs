use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Container image loader kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loader {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Paper,
    Spigot,
}

impl Loader {
    /// The `TYPE` value the reference server image expects, also used as
    /// the `discopanel.server.loader` container label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Loader::Vanilla => "VANILLA",
            Loader::Forge => "FORGE",
            Loader::Fabric => "FABRIC",
            Loader::NeoForge => "NEOFORGE",
            Loader::Paper => "PAPER",
            Loader::Spigot => "SPIGOT",
        }
    }
}

/// Protocol a port mapping speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

/// An additional port exposed by a Server, beyond the game and RCON ports
/// the Runtime Adapter binds implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub name: String,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: PortProtocol,
    /// When true, the TCP Proxy handles ingress for this port instead of a
    /// host bind.
    pub proxy_enabled: bool,
}

/// Observed lifecycle status of a Server's container, as reconciled from the
/// Runtime Adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Creating,
    Starting,
    Running,
    Unhealthy,
    Stopping,
    Stopped,
    Error,
}

/// A bind or volume mount attached to a container beyond the Server's own
/// data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOverride {
    pub source: String,
    pub target: String,
    pub read_only: bool,
    pub is_bind: bool,
}

/// Extra environment, mounts, and resource/runtime knobs layered on top of a
/// Server's defaults at container-create time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOverrides {
    pub extra_env: HashMap<String, String>,
    pub extra_mounts: Vec<MountOverride>,
    pub network_mode: Option<String>,
    pub restart_policy: Option<String>,
    pub cpu_limit_cores: Option<f64>,
    pub memory_limit_mb: Option<u32>,
    pub labels: HashMap<String, String>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub devices: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub privileged: bool,
    pub read_only_rootfs: bool,
    pub security_opt: Vec<String>,
    pub shm_size_mb: Option<u64>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub init_commands: Vec<String>,
}

impl RuntimeOverrides {
    pub fn cpu_limit_nanos(&self) -> Option<i64> {
        self.cpu_limit_cores
            .map(|cores| (cores * 1_000_000_000.0) as i64)
    }
}

/// A managed Minecraft server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub display_name: String,
    pub loader: Loader,
    pub game_version: String,
    pub memory_mb: u32,
    pub max_players: u32,
    /// 0 if proxy-only (no host-bound game port).
    pub external_port: u16,
    pub additional_ports: Vec<PortMapping>,
    pub image: String,
    pub container_id: String,
    pub status: ServerStatus,
    pub last_started_at: Option<DateTime<Utc>>,
    pub data_dir: String,
    pub virtual_host: Option<String>,
    pub listener_id: Option<String>,
    pub autostart: bool,
    pub detached: bool,
    pub overrides: RuntimeOverrides,
}

impl Server {
    pub const DEFAULT_GAME_PORT: u16 = 25565;
    pub const DEFAULT_RCON_PORT: u16 = 25575;

    /// §3 invariant: a virtual hostname pins the container's internal game
    /// port to the default and the external port is not host-bound.
    pub fn proxied(&self) -> bool {
        self.virtual_host.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.detached && self.autostart {
            return Err("a detached server cannot also be autostart".to_owned());
        }
        if self.proxied() && self.external_port != 0 {
            return Err("a server with a virtual hostname must not bind an external port".to_owned());
        }
        if !self.proxied() && self.external_port == 0 {
            return Err("a non-proxied server must declare an external port".to_owned());
        }
        for p in &self.additional_ports {
            if p.host_port == 0 && !p.proxy_enabled {
                return Err(format!("port mapping {} has no host port and is not proxy-enabled", p.name));
            }
        }
        Ok(())
    }
}

/// A single typed row in the Server Config table (§3). The reserved id
/// `"__defaults__"` represents process-wide defaults for new Servers.
pub const GLOBAL_DEFAULTS_ID: &str = "__defaults__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigValueType {
    String,
    Int,
    Bool,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigField {
    pub category: String,
    pub key: String,
    pub value_type: ConfigValueType,
    pub default: String,
    pub env_var: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub owner_id: String,
    pub fields: Vec<ServerConfigField>,
}

impl ServerConfig {
    /// Renders the declared fields to an environment map, applying each
    /// field's default where no explicit value is supplied. Iterated once
    /// per render from a declarative table rather than via reflection over
    /// a struct's fields.
    pub fn render_env(&self, values: &HashMap<String, String>) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| {
                let v = values.get(&f.key).cloned().unwrap_or_else(|| f.default.clone());
                (f.env_var.clone(), v)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_server() -> Server {
        Server {
            id: "s1".into(),
            display_name: "Survival".into(),
            loader: Loader::Vanilla,
            game_version: "1.20.1".into(),
            memory_mb: 2048,
            max_players: 20,
            external_port: 25565,
            additional_ports: vec![],
            image: "itzg/minecraft-server:latest".into(),
            container_id: String::new(),
            status: ServerStatus::Stopped,
            last_started_at: None,
            data_dir: "/data/servers/s1".into(),
            virtual_host: None,
            listener_id: None,
            autostart: false,
            detached: false,
            overrides: RuntimeOverrides::default(),
        }
    }

    #[test]
    fn detached_and_autostart_conflict() {
        let mut s = base_server();
        s.detached = true;
        s.autostart = true;
        assert!(s.validate().is_err());
    }

    #[test]
    fn proxied_server_must_not_bind_external_port() {
        let mut s = base_server();
        s.virtual_host = Some("survival".into());
        assert!(s.validate().is_err());
        s.external_port = 0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn render_env_uses_default_when_unset() {
        let cfg = ServerConfig {
            owner_id: "s1".into(),
            fields: vec![ServerConfigField {
                category: "world".into(),
                key: "difficulty".into(),
                value_type: ConfigValueType::Enum,
                default: "normal".into(),
                env_var: "DIFFICULTY".into(),
            }],
        };
        let env = cfg.render_env(&HashMap::new());
        assert_eq!(env.get("DIFFICULTY"), Some(&"normal".to_owned()));
    }
}
