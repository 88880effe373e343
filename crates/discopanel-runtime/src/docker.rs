//! `RuntimeAdapter` implementation backed by the Docker Engine API via
//! `bollard`.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, PortBinding as BollardPortBinding, PortMap};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use discopanel_proto::log_frame::FrameStream as McFrameStream;
use discopanel_proto::RuntimeFrame;
use discopanel_types::Error;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::adapter::{ContainerStats, InspectResult, LogFrameStream, RuntimeAdapter, RuntimeStatus};
use crate::labels::{owner_filter, OWNER_LABEL};
use crate::spec::ContainerSpec;

type DResult<T> = discopanel_types::Result<T>;

pub struct DockerAdapter {
    docker: Docker,
}

impl DockerAdapter {
    /// Connects using the platform default (the Unix socket at
    /// `/var/run/docker.sock` on Linux).
    pub fn connect() -> DResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl RuntimeAdapter for DockerAdapter {
    async fn create(&self, spec: &ContainerSpec) -> DResult<String> {
        ensure_image_present(&self.docker, &spec.image).await?;

        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .ports
            .iter()
            .map(|p| (format!("{}/{}", p.container_port, p.protocol), HashMap::new()))
            .collect();

        // A binding is only emitted for ports that actually bind on the
        // host; ports with `host_port: None` (proxy-handled ports, and the
        // game port on a proxied Server) are still exposed to the network
        // via `exposed_ports` above but must not receive a Docker-assigned
        // random host port.
        let mut port_bindings: PortMap = HashMap::new();
        for p in &spec.ports {
            let Some(host_port) = p.host_port else {
                continue;
            };
            let key = format!("{}/{}", p.container_port, p.protocol);
            let binding = BollardPortBinding {
                host_ip: p.host_ip.clone(),
                host_port: Some(host_port.to_string()),
            };
            port_bindings.entry(key).or_insert_with(|| Some(Vec::new())).get_or_insert_with(Vec::new).push(binding);
        }

        let binds: Vec<String> = spec
            .mounts
            .iter()
            .map(|m| {
                let mode = if m.read_only { "ro" } else { "rw" };
                format!("{}:{}:{mode}", m.source, m.target)
            })
            .collect();

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let host_config = HostConfig {
            binds: if binds.is_empty() { None } else { Some(binds) },
            port_bindings: Some(port_bindings),
            network_mode: Some(spec.network.clone()),
            restart_policy: spec.restart_policy.as_ref().map(|p| bollard::models::RestartPolicy {
                name: restart_policy_name(p),
                maximum_retry_count: None,
            }),
            nano_cpus: spec.cpu_limit_cores.map(|c| (c * 1_000_000_000.0) as i64),
            memory: spec.memory_limit_mb.map(|m| (m as i64) * 1024 * 1024),
            cap_add: none_if_empty(spec.cap_add.clone()),
            cap_drop: none_if_empty(spec.cap_drop.clone()),
            devices: none_if_empty(
                spec.devices
                    .iter()
                    .map(|d| bollard::models::DeviceMapping {
                        path_on_host: Some(d.clone()),
                        path_in_container: Some(d.clone()),
                        cgroup_permissions: Some("rwm".to_owned()),
                    })
                    .collect(),
            ),
            extra_hosts: none_if_empty(spec.extra_hosts.clone()),
            privileged: Some(spec.privileged),
            readonly_rootfs: Some(spec.read_only_rootfs),
            security_opt: none_if_empty(spec.security_opt.clone()),
            shm_size: spec.shm_size_mb.map(|m| (m as i64) * 1024 * 1024),
            log_config: Some(bollard::models::HostConfigLogConfig {
                typ: Some("json-file".to_owned()),
                config: Some(HashMap::from([
                    ("max-size".to_owned(), spec.log_driver.max_size.clone()),
                    ("max-file".to_owned(), spec.log_driver.max_file.clone()),
                ])),
            }),
            auto_remove: Some(false),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: Some(spec.labels.clone()),
            cmd: spec.command.clone(),
            entrypoint: spec.entrypoint.clone(),
            exposed_ports: Some(exposed_ports),
            user: spec.user.clone(),
            working_dir: spec.working_dir.clone(),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self.docker.create_container(Some(options), config).await?;
        for warning in &response.warnings {
            warn!(container = %spec.name, %warning, "docker reported a warning creating the container");
        }
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> DResult<()> {
        self.docker.start_container(id, None::<StartContainerOptions<String>>).await?;
        Ok(())
    }

    async fn stop(&self, id: &str, grace: Duration) -> DResult<bool> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let classified: Error = e.into();
                if classified.is_not_found() {
                    return Ok(false);
                }
                warn!(%id, error = %classified, "graceful stop failed, escalating to kill");
                match self.docker.kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" })).await {
                    Ok(()) => Ok(true),
                    Err(e2) => {
                        let classified2: Error = e2.into();
                        if classified2.is_not_found() {
                            Ok(false)
                        } else {
                            Err(classified2)
                        }
                    }
                }
            }
        }
    }

    async fn remove(&self, id: &str) -> DResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let classified: Error = e.into();
                if classified.is_not_found() {
                    Ok(())
                } else {
                    Err(classified)
                }
            }
        }
    }

    async fn inspect(&self, id: &str) -> DResult<InspectResult> {
        let inspect = self.docker.inspect_container(id, None).await?;

        let state = inspect.state.as_ref();
        let health_status = state.and_then(|s| s.health.as_ref()).and_then(|h| h.status);
        let running = state.and_then(|s| s.running).unwrap_or(false);
        let restarting = state.and_then(|s| s.restarting).unwrap_or(false);

        let status = if restarting {
            RuntimeStatus::Starting
        } else if running {
            use bollard::models::HealthStatusEnum as H;
            match health_status {
                Some(H::HEALTHY) => RuntimeStatus::Running,
                Some(H::STARTING) => RuntimeStatus::Starting,
                Some(H::UNHEALTHY) => RuntimeStatus::Unhealthy,
                _ => RuntimeStatus::Running,
            }
        } else {
            RuntimeStatus::Stopped
        };

        let mut networks = HashMap::new();
        if let Some(net_settings) = inspect.network_settings.as_ref() {
            if let Some(nets) = net_settings.networks.as_ref() {
                for (name, settings) in nets {
                    if let Some(ip) = settings.ip_address.as_ref().filter(|s| !s.is_empty()) {
                        if let Ok(addr) = ip.parse::<IpAddr>() {
                            networks.insert(name.clone(), addr);
                        }
                    }
                }
            }
        }

        let entrypoint = inspect
            .config
            .as_ref()
            .and_then(|c| c.entrypoint.clone())
            .unwrap_or_default();

        Ok(InspectResult {
            status,
            networks,
            entrypoint,
        })
    }

    async fn stats(&self, id: &str) -> DResult<ContainerStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let stats = self
            .docker
            .stats(id, Some(options))
            .next()
            .await
            .ok_or_else(|| Error::Transient("no stats sample returned".to_owned()))??;

        let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64 - stats.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta =
            stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64 - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
        let online_cpus = stats
            .cpu_stats
            .online_cpus
            .or_else(|| stats.cpu_stats.cpu_usage.percpu_usage.as_ref().map(|v| v.len() as u64))
            .unwrap_or(1) as f64;

        let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
            (cpu_delta / system_delta) * online_cpus * 100.0
        } else {
            0.0
        };

        let memory_usage = stats.memory_stats.usage.unwrap_or(0) as f64 / (1024.0 * 1024.0);
        let memory_limit = stats.memory_stats.limit.unwrap_or(0) as f64 / (1024.0 * 1024.0);

        Ok(ContainerStats {
            cpu_percent,
            memory_mb: memory_usage,
            memory_limit_mb: memory_limit,
        })
    }

    async fn exec(&self, id: &str, argv: &[String]) -> DResult<String> {
        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut combined = String::new();
        match self.docker.start_exec(&exec.id, None::<bollard::exec::StartExecOptions>).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk? {
                        LogOutput::StdOut { message } | LogOutput::StdErr { message } | LogOutput::Console { message } => {
                            combined.push_str(&String::from_utf8_lossy(&message));
                        }
                        LogOutput::StdIn { .. } => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspected = self.docker.inspect_exec(&exec.id).await?;
        match inspected.exit_code {
            Some(0) | None => Ok(combined),
            Some(code) => Err(Error::Transient(format!("exec exited with code {code}: {combined}"))),
        }
    }

    async fn logs(&self, id: &str) -> DResult<LogFrameStream> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "0".to_owned(),
            ..Default::default()
        };

        let stream = self.docker.logs(id, Some(options)).filter_map(|item| async move {
            match item {
                Ok(LogOutput::StdOut { message } | LogOutput::Console { message }) => Some(Ok(RuntimeFrame {
                    stream: McFrameStream::Stdout,
                    payload: message.to_vec(),
                })),
                Ok(LogOutput::StdErr { message }) => Some(Ok(RuntimeFrame {
                    stream: McFrameStream::Stderr,
                    payload: message.to_vec(),
                })),
                Ok(LogOutput::StdIn { .. }) => None,
                Err(e) => Some(Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))),
            }
        });

        Ok(Box::pin(stream))
    }

    async fn ensure_network(&self, name: &str) -> DResult<()> {
        let existing = self
            .docker
            .list_networks(Some(ListNetworksOptions {
                filters: HashMap::from([("name".to_owned(), vec![name.to_owned()])]),
            }))
            .await?;
        if existing.iter().any(|n| n.name.as_deref() == Some(name)) {
            return Ok(());
        }

        let options = CreateNetworkOptions {
            name: name.to_owned(),
            driver: "bridge".to_owned(),
            labels: HashMap::from([(OWNER_LABEL.to_owned(), "true".to_owned())]),
            ..Default::default()
        };
        match self.docker.create_network(options).await {
            Ok(_) => {
                info!(%name, "created control-plane bridge network");
                Ok(())
            }
            Err(e) => {
                let classified: Error = e.into();
                if classified.is_not_found() {
                    Ok(())
                } else {
                    Err(classified)
                }
            }
        }
    }

    async fn list_orphans(&self, tracked: &HashSet<String>) -> DResult<Vec<String>> {
        let options = ListContainersOptions {
            all: true,
            filters: owner_filter(),
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .filter_map(|c| c.id)
            .filter(|id| !tracked.contains(id))
            .collect())
    }
}

async fn ensure_image_present(docker: &Docker, image: &str) -> DResult<()> {
    if docker.inspect_image(image).await.is_ok() {
        return Ok(());
    }

    let options = bollard::image::CreateImageOptions {
        from_image: image.to_owned(),
        ..Default::default()
    };
    let mut stream = docker.create_image(Some(options), None, None);
    while let Some(item) = stream.next().await {
        match item {
            Ok(info) => {
                if let Some(status) = info.status {
                    debug!(%image, %status, "pulling image");
                }
            }
            Err(e) => {
                let classified: Error = e.into();
                return Err(match classified {
                    Error::NotFound { .. } => Error::ImageUnavailable(image.to_owned()),
                    other => other,
                });
            }
        }
    }
    Ok(())
}

fn restart_policy_name(policy: &str) -> Option<bollard::models::RestartPolicyNameEnum> {
    use bollard::models::RestartPolicyNameEnum as R;
    match policy {
        "always" => Some(R::ALWAYS),
        "unless-stopped" => Some(R::UNLESS_STOPPED),
        "on-failure" => Some(R::ON_FAILURE),
        _ => Some(R::NO),
    }
}

fn none_if_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}
