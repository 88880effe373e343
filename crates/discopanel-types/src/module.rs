use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::server::{PortMapping, ServerStatus};

/// An immutable, operator-authored definition a Module is instantiated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTemplate {
    pub id: String,
    pub name: String,
    pub image: String,
    pub default_env: HashMap<String, String>,
    pub default_volumes: Vec<crate::server::MountOverride>,
    pub default_ports: Vec<PortMapping>,
    pub default_command: Option<Vec<String>>,
    pub health_check_path: Option<String>,
    pub health_check_port: Option<u16>,
    pub documentation: String,
}

/// A declared ordering dependency between Modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub module_id: String,
    pub wait_for_healthy: bool,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleEvent {
    ServerStart,
    ServerStop,
    ServerHealthy,
    PlayerJoin,
    PlayerLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookAction {
    Start,
    Stop,
    Restart,
    Exec,
    Rcon,
}

/// One hook attached to a Module, fired when its `event` is dispatched on
/// the owning Server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHook {
    pub event: ModuleEvent,
    pub action: HookAction,
    pub command: Option<String>,
    pub delay_seconds: Option<u64>,
    /// Expanded through alias substitution to `LHS OP RHS` before
    /// evaluation; see discopanel-alias and discopanel-modules::condition.
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub interval_seconds: u64,
    pub retries: u32,
    pub timeout_seconds: u64,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            retries: 3,
            timeout_seconds: 60,
        }
    }
}

/// A sidecar container attached to a parent Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub server_id: String,
    pub template_id: String,
    pub status: ServerStatus,
    pub container_id: String,
    pub port_bindings: Vec<PortMapping>,
    pub memory_mb: Option<u32>,
    pub cpu_limit_cores: Option<f64>,
    pub env_overrides: Value,
    pub volume_overrides: Value,
    pub dependencies: Vec<ModuleDependency>,
    pub event_hooks: Vec<EventHook>,
    pub autostart: bool,
    pub detached: bool,
    pub health_check: HealthCheckSpec,
}

impl Module {
    pub fn env_override_map(&self) -> HashMap<String, String> {
        match &self.env_overrides {
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect(),
            _ => HashMap::new(),
        }
    }

    /// Parses `volume_overrides` as a list of `MountOverride` rows, skipping
    /// any entry that doesn't match the shape (rather than failing the
    /// whole parse).
    pub fn volume_override_list(&self) -> Vec<crate::server::MountOverride> {
        match &self.volume_overrides {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}
