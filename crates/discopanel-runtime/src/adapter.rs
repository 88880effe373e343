//! The Runtime Adapter contract (§4.1): a uniform interface over a host
//! container runtime, polymorphic over the capability set every supported
//! runtime exposes. `DockerAdapter` (in `docker.rs`) is the Docker Engine
//! API implementation; a Podman-compatible runtime can implement the same
//! trait since both speak the same container API surface.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use discopanel_proto::RuntimeFrame;
use discopanel_types::Result;
use futures_util::Stream;

use crate::spec::ContainerSpec;

/// The unified status set Inspect results are mapped onto, per §4.1's
/// table (`running`+health ⇒ running|starting|unhealthy, `restarting` ⇒
/// starting, `exited|dead|created|paused|removing` ⇒ stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Running,
    Starting,
    Unhealthy,
    Stopped,
}

/// The result of an `Inspect` call: the unified status, the container's
/// address on each network it's attached to (used for bridge-mode backend
/// discovery, §4.4), and its original entrypoint (used as the fallback the
/// init-command wrapper execs into, §4.1).
#[derive(Debug, Clone)]
pub struct InspectResult {
    pub status: RuntimeStatus,
    pub networks: HashMap<String, IpAddr>,
    pub entrypoint: Vec<String>,
}

impl InspectResult {
    pub fn network_ip(&self, network: &str) -> Option<IpAddr> {
        self.networks.get(network).copied()
    }
}

/// CPU/memory usage sampled by the Metrics Collector's Docker-stats task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub memory_limit_mb: f64,
}

/// A boxed stream of decoded log frames, as yielded by `RuntimeAdapter::logs`.
/// The wire format the frames were demultiplexed from is the 8-byte header
/// documented on `discopanel_proto::log_frame`; an adapter backed by a
/// runtime that doesn't demultiplex on the client's behalf can produce this
/// stream directly from `discopanel_proto::log_frame::read_frame` over a raw
/// socket.
pub type LogFrameStream = Pin<Box<dyn Stream<Item = std::io::Result<RuntimeFrame>> + Send>>;

/// Uniform interface over a host container runtime (§4.1).
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Materialises a container from `spec`. Fails with `ImageUnavailable`
    /// if the image is neither present locally nor resolvable from a
    /// remote registry.
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    /// Idempotent; fails with `NotFound` if the container is gone.
    async fn start(&self, id: &str) -> Result<()>;

    /// Attempts a graceful stop within `grace`, escalating to a hard kill
    /// on failure. Returns `found = false` (not an error) when the
    /// container is already absent, so callers can clean up stale
    /// references without erroring.
    async fn stop(&self, id: &str, grace: Duration) -> Result<bool>;

    async fn remove(&self, id: &str) -> Result<()>;

    async fn inspect(&self, id: &str) -> Result<InspectResult>;

    /// `cpu_percent` is `(cpu_delta / system_delta) * online_cpus * 100`.
    async fn stats(&self, id: &str) -> Result<ContainerStats>;

    /// Runs `argv` inside the container and returns combined stdout+stderr.
    /// A non-zero exit surfaces as `Error::Transient` carrying the code.
    async fn exec(&self, id: &str, argv: &[String]) -> Result<String>;

    /// Returns a stream of decoded log frames for the container's
    /// interleaved stdout/stderr, for the Log Streamer's pump to consume.
    async fn logs(&self, id: &str) -> Result<LogFrameStream>;

    /// Idempotent creation of a bridge network bearing the control-plane
    /// label.
    async fn ensure_network(&self, name: &str) -> Result<()>;

    /// Enumerates containers bearing the control-plane label whose id is
    /// not in `tracked`.
    async fn list_orphans(&self, tracked: &HashSet<String>) -> Result<Vec<String>>;

    /// Stops and removes every container `list_orphans` would return.
    async fn cleanup_orphans(&self, tracked: &HashSet<String>) -> Result<()> {
        for id in self.list_orphans(tracked).await? {
            let _ = self.stop(&id, Duration::from_secs(5)).await;
            let _ = self.remove(&id).await;
        }
        Ok(())
    }
}
