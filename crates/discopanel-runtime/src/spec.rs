//! The input to `RuntimeAdapter::create`: everything needed to materialise
//! one container, already flattened from a Server/Module plus its
//! `RuntimeOverrides` by the caller (the Controller or Module Manager).

use std::collections::HashMap;

use discopanel_types::{MountOverride, PortMapping};

/// A single `container_port/protocol → host bind` entry. `host_port = None`
/// exposes the port to the network without binding it on the host (used for
/// ports a Listener's Proxy handles instead).
#[derive(Debug, Clone)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: &'static str,
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct BindMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl From<&MountOverride> for BindMount {
    fn from(m: &MountOverride) -> Self {
        Self {
            source: m.source.clone(),
            target: m.target.clone(),
            read_only: m.read_only,
        }
    }
}

/// log-driver config the adapter applies to every container it creates:
/// json-file, 10 MB per file, 3 files kept.
#[derive(Debug, Clone)]
pub struct LogDriverConfig {
    pub max_size: String,
    pub max_file: String,
}

impl Default for LogDriverConfig {
    fn default() -> Self {
        Self {
            max_size: "10m".to_owned(),
            max_file: "3".to_owned(),
        }
    }
}

/// Input to `Create`. Built by the caller from a Server/Module plus its
/// `RuntimeOverrides`; the adapter does not know about either entity type.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub mounts: Vec<BindMount>,
    pub ports: Vec<PortBinding>,
    pub network: String,
    pub cpu_limit_cores: Option<f64>,
    pub memory_limit_mb: Option<u32>,
    pub restart_policy: Option<String>,
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
    pub log_driver: LogDriverConfig,
}

impl ContainerSpec {
    pub fn additional_port_bindings(ports: &[PortMapping]) -> Vec<PortBinding> {
        ports
            .iter()
            .map(|p| PortBinding {
                container_port: p.container_port,
                protocol: match p.protocol {
                    discopanel_types::PortProtocol::Tcp => "tcp",
                    discopanel_types::PortProtocol::Udp => "udp",
                },
                host_ip: None,
                host_port: if p.proxy_enabled { None } else { Some(p.host_port) },
            })
            .collect()
    }
}
