use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use discopanel_runtime::RuntimeAdapter;
use discopanel_slp::{ping, SlpRequest};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::MetricsConfig;
use crate::disk;
use crate::rcon::{parse_player_count, parse_tps};
use crate::types::{MetricsTarget, ServerMetrics};

/// The Metrics Collector (§4.6): four independently-ticking samplers
/// writing into one shared snapshot map through a single `update` helper.
pub struct MetricsCollector {
    adapter: Arc<dyn RuntimeAdapter>,
    config: MetricsConfig,
    targets: RwLock<HashMap<String, MetricsTarget>>,
    metrics: Mutex<HashMap<String, ServerMetrics>>,
}

impl MetricsCollector {
    pub fn new(adapter: Arc<dyn RuntimeAdapter>, config: MetricsConfig) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            config,
            targets: RwLock::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
        })
    }

    /// Starts (or replaces) sampling for a server. Called by the Controller
    /// once a Server's container id is known.
    pub async fn track(&self, target: MetricsTarget) {
        self.targets.write().await.insert(target.server_id.clone(), target);
    }

    /// Stops sampling and discards the last snapshot for a server. Called
    /// by `DeleteServer`.
    pub async fn forget(&self, server_id: &str) {
        self.targets.write().await.remove(server_id);
        self.metrics.lock().await.remove(server_id);
    }

    pub async fn snapshot(&self, server_id: &str) -> Option<ServerMetrics> {
        self.metrics.lock().await.get(server_id).cloned()
    }

    pub async fn snapshot_all(&self) -> HashMap<String, ServerMetrics> {
        self.metrics.lock().await.clone()
    }

    /// Single mutex-guarded entry point for every ticker's writes (§4.6:
    /// "all writes go through a single update(serverId, fn) helper under
    /// one mutex").
    async fn update(&self, server_id: &str, f: impl FnOnce(&mut ServerMetrics)) {
        let mut metrics = self.metrics.lock().await;
        let entry = metrics.entry(server_id.to_owned()).or_default();
        f(entry);
        entry.updated_at = Some(Utc::now());
    }

    async fn targets_snapshot(&self) -> Vec<MetricsTarget> {
        self.targets.read().await.values().cloned().collect()
    }

    /// Runs all four tickers until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tokio::join!(
            self.clone().docker_stats_loop(shutdown.clone()),
            self.clone().rcon_loop(shutdown.clone()),
            self.clone().disk_loop(shutdown.clone()),
            self.clone().slp_loop(shutdown),
        );
    }

    async fn docker_stats_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.docker_stats_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.sample_docker_stats().await,
            }
        }
    }

    #[instrument(skip(self))]
    async fn sample_docker_stats(self: &Arc<Self>) {
        for target in self.targets_snapshot().await {
            match self.adapter.stats(&target.container_id).await {
                Ok(stats) => {
                    self.update(&target.server_id, |m| {
                        m.cpu_percent = Some(stats.cpu_percent);
                        m.memory_mb = Some(stats.memory_mb);
                        m.memory_limit_mb = Some(stats.memory_limit_mb);
                    })
                    .await;
                }
                Err(e) => {
                    warn!(server_id = %target.server_id, error = %e, "docker stats sample failed");
                }
            }
        }
    }

    async fn rcon_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.rcon_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.sample_rcon().await,
            }
        }
    }

    #[instrument(skip(self))]
    async fn sample_rcon(self: &Arc<Self>) {
        for target in self.targets_snapshot().await {
            match self.adapter.exec(&target.container_id, &list_argv()).await {
                Ok(output) => {
                    if let Some((online, max)) = parse_player_count(&output) {
                        self.update(&target.server_id, |m| {
                            m.players_online = Some(online);
                            m.players_max = Some(max);
                        })
                        .await;
                    }
                }
                Err(e) => {
                    debug!(server_id = %target.server_id, error = %e, "rcon player-count sample failed");
                }
            }

            if let Some(tps) = self.sample_tps(&target).await {
                self.update(&target.server_id, |m| m.tps = Some(tps)).await;
            }
        }
    }

    async fn sample_tps(&self, target: &MetricsTarget) -> Option<f64> {
        for argv in &target.tps_commands {
            if let Ok(output) = self.adapter.exec(&target.container_id, argv).await {
                if let Some(tps) = parse_tps(&output) {
                    return Some(tps);
                }
            }
        }
        None
    }

    async fn disk_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.disk_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.sample_disk().await,
            }
        }
    }

    #[instrument(skip(self))]
    async fn sample_disk(self: &Arc<Self>) {
        for target in self.targets_snapshot().await {
            let world_size = disk::world_size_bytes(&target.world_dir).await;
            let free_space = disk::free_space_bytes(&target.data_volume);
            self.update(&target.server_id, |m| {
                m.world_size_bytes = Some(world_size);
                m.disk_free_bytes = free_space;
            })
            .await;
        }
    }

    async fn slp_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.slp_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.sample_slp().await,
            }
        }
    }

    #[instrument(skip(self))]
    async fn sample_slp(self: &Arc<Self>) {
        for target in self.targets_snapshot().await {
            let mut request = SlpRequest::new(target.slp_host.clone(), target.slp_port, target.game_version.clone());
            request.timeout = self.config.slp_timeout;

            match ping(&request).await {
                Ok(result) => {
                    self.update(&target.server_id, |m| {
                        m.players_online = Some(result.online_players.max(0) as u32);
                        m.players_max = Some(result.max_players.max(0) as u32);
                        m.slp_latency_ms = Some(result.latency_ms);
                    })
                    .await;
                }
                Err(e) => {
                    debug!(server_id = %target.server_id, error = %e, "slp sample failed");
                }
            }
        }
    }
}

fn list_argv() -> Vec<String> {
    vec!["rcon-cli".to_owned(), "list".to_owned()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_runtime::mock::MockAdapter;
    use std::time::Duration;

    fn target(server_id: &str, container_id: &str) -> MetricsTarget {
        MetricsTarget {
            server_id: server_id.to_owned(),
            container_id: container_id.to_owned(),
            world_dir: std::env::temp_dir(),
            data_volume: std::env::temp_dir(),
            tps_commands: vec![],
            slp_host: "127.0.0.1".to_owned(),
            slp_port: 1,
            game_version: "1.20.1".to_owned(),
        }
    }

    #[tokio::test]
    async fn docker_stats_sample_populates_snapshot() {
        let adapter = MockAdapter::new();
        let id = adapter.create(&discopanel_runtime::ContainerSpec {
            name: "s1".into(),
            image: "itzg/minecraft-server:latest".into(),
            env: Default::default(),
            labels: Default::default(),
            command: None,
            entrypoint: None,
            mounts: vec![],
            ports: vec![],
            network: "discopanel".into(),
            cpu_limit_cores: None,
            memory_limit_mb: None,
            restart_policy: None,
            cap_add: vec![],
            cap_drop: vec![],
            devices: vec![],
            extra_hosts: vec![],
            privileged: false,
            read_only_rootfs: false,
            security_opt: vec![],
            shm_size_mb: None,
            user: None,
            working_dir: None,
            log_driver: Default::default(),
        })
        .await
        .unwrap();

        let collector = MetricsCollector::new(adapter, MetricsConfig::default());
        collector.track(target("s1", &id)).await;
        collector.sample_docker_stats().await;

        let snapshot = collector.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.cpu_percent, Some(3.5));
        assert_eq!(snapshot.memory_mb, Some(512.0));
    }

    #[tokio::test]
    async fn rcon_sample_parses_player_count_from_exec_output() {
        let adapter = MockAdapter::new();
        let id = adapter
            .create(&discopanel_runtime::ContainerSpec {
                name: "s1".into(),
                image: "itzg/minecraft-server:latest".into(),
                env: Default::default(),
                labels: Default::default(),
                command: None,
                entrypoint: None,
                mounts: vec![],
                ports: vec![],
                network: "discopanel".into(),
                cpu_limit_cores: None,
                memory_limit_mb: None,
                restart_policy: None,
                cap_add: vec![],
                cap_drop: vec![],
                devices: vec![],
                extra_hosts: vec![],
                privileged: false,
                read_only_rootfs: false,
                security_opt: vec![],
                shm_size_mb: None,
                user: None,
                working_dir: None,
                log_driver: Default::default(),
            })
            .await
            .unwrap();
        adapter
            .queue_exec_response(&id, "rcon-cli list", "There are 2 of a max of 20 players online: a, b")
            .await;

        let collector = MetricsCollector::new(adapter, MetricsConfig::default());
        collector.track(target("s1", &id)).await;
        collector.sample_rcon().await;

        let snapshot = collector.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.players_online, Some(2));
        assert_eq!(snapshot.players_max, Some(20));
    }

    #[tokio::test]
    async fn forget_removes_target_and_snapshot() {
        let adapter = MockAdapter::new();
        let collector = MetricsCollector::new(adapter, MetricsConfig::default());
        collector.track(target("s1", "c1")).await;
        collector.update("s1", |m| m.cpu_percent = Some(1.0)).await;
        assert!(collector.snapshot("s1").await.is_some());

        collector.forget("s1").await;
        assert!(collector.snapshot("s1").await.is_none());
        assert!(collector.targets_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn run_stops_promptly_on_cancellation() {
        let adapter = MockAdapter::new();
        let collector = MetricsCollector::new(adapter, MetricsConfig::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), collector.run(shutdown)).await.unwrap();
    }
}
