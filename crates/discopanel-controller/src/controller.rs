//! The Server Controller (§4.2): the per-Server state machine, the
//! reconciliation loop that is the sole mechanism by which `unhealthy` is
//! observed, and the startup/shutdown sequences that bring the fleet up and
//! down around it.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use discopanel_logs::LogStreamer;
use discopanel_metrics::{MetricsCollector, MetricsTarget};
use discopanel_modules::{ModuleManager, ModuleStore};
use discopanel_routes::RouteRegistry;
use discopanel_runtime::{RuntimeAdapter, RuntimeStatus};
use discopanel_types::{BackendEndpoint, Error, ModuleEvent, Result, Server, ServerStatus};
use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::ControllerConfig;
use crate::spec_builder;
use crate::store::ServerStore;

/// Result of `RecreateServer` (§4.2): the freshly created container id, and
/// whether the old one was running (so the caller knows whether to expect
/// the new container to already be starting).
#[derive(Debug, Clone)]
pub struct RecreateOutcome {
    pub new_container_id: String,
    pub was_running: bool,
}

/// The Server Controller: the top of the core. Drives the Runtime Adapter
/// to materialise containers, registers container ids with the Log
/// Streamer, publishes Routes for proxied Servers, feeds the Metrics
/// Collector, and (when a Module Manager is attached) dispatches lifecycle
/// events to sidecar hooks.
pub struct ServerController {
    adapter: Arc<dyn RuntimeAdapter>,
    store: Arc<dyn ServerStore>,
    logs: Arc<LogStreamer>,
    routes: Arc<RouteRegistry>,
    metrics: Arc<MetricsCollector>,
    modules: Option<(Arc<ModuleManager>, Arc<dyn ModuleStore>)>,
    config: ControllerConfig,
    /// One mutex per Server id, held across a whole transition so no two
    /// run concurrently for the same Server (§5).
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ServerController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn RuntimeAdapter>,
        store: Arc<dyn ServerStore>,
        logs: Arc<LogStreamer>,
        routes: Arc<RouteRegistry>,
        metrics: Arc<MetricsCollector>,
        modules: Option<(Arc<ModuleManager>, Arc<dyn ModuleStore>)>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            store,
            logs,
            routes,
            metrics,
            modules,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(id.to_owned()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// `CreateServer` (§4.2): persists the Server, materialises its
    /// container, and optionally transitions it straight to running.
    #[instrument(skip(self, server))]
    pub async fn create_server(&self, mut server: Server, start_immediately: bool) -> Result<Server> {
        server.validate().map_err(Error::InvalidSpec)?;

        let lock = self.lock_for(&server.id).await;
        let _guard = lock.lock().await;

        self.adapter.ensure_network(&self.config.control_plane_network).await?;

        let spec = spec_builder::build(&server, &HashMap::new(), &self.config)
            .await
            .map_err(|e| Error::InvalidSpec(e.to_string()))?;

        let container_id = self.adapter.create(&spec).await?;
        server.container_id = container_id;
        server.status = ServerStatus::Stopped;
        self.store.upsert(&server).await?;

        if start_immediately {
            self.start_locked(&mut server).await?;
            self.store.upsert(&server).await?;
        }

        Ok(server)
    }

    /// `StartServer` (§4.2).
    #[instrument(skip(self))]
    pub async fn start_server(&self, id: &str) -> Result<Server> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut server = self.store.get(id).await?;
        self.start_locked(&mut server).await?;
        self.store.upsert(&server).await?;
        Ok(server)
    }

    /// `StopServer` (§4.2): stops streaming first, then stops the
    /// container with the configured grace, escalating to a kill on
    /// failure inside the adapter. `found=false` is handled as success.
    #[instrument(skip(self))]
    pub async fn stop_server(&self, id: &str) -> Result<Server> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut server = self.store.get(id).await?;
        self.stop_locked(&mut server).await?;
        self.store.upsert(&server).await?;
        Ok(server)
    }

    /// `RestartServer(id, delay)`: stop -> wait delay -> start, as one
    /// atomic transition under the per-Server lock.
    #[instrument(skip(self))]
    pub async fn restart_server(&self, id: &str, delay: Duration) -> Result<Server> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut server = self.store.get(id).await?;
        self.stop_locked(&mut server).await?;
        self.store.upsert(&server).await?;

        tokio::time::sleep(delay).await;

        self.start_locked(&mut server).await?;
        self.store.upsert(&server).await?;
        Ok(server)
    }

    /// `RecreateServer(id, newSpec)`: captures `wasRunning`, stops (if
    /// running), removes the old container, creates a new one from
    /// `new_spec`, migrates every log subscriber from the old container id
    /// to the new one, and starts the new container iff `wasRunning`.
    #[instrument(skip(self, new_spec))]
    pub async fn recreate_server(&self, id: &str, mut new_spec: Server) -> Result<RecreateOutcome> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut server = self.store.get(id).await?;
        let was_running = matches!(server.status, ServerStatus::Running | ServerStatus::Starting | ServerStatus::Unhealthy);

        if was_running {
            self.stop_locked(&mut server).await?;
        }

        let old_container_id = std::mem::take(&mut server.container_id);
        if !old_container_id.is_empty() {
            let _ = self.adapter.remove(&old_container_id).await;
        }

        new_spec.id = server.id.clone();
        new_spec.validate().map_err(Error::InvalidSpec)?;

        let spec = spec_builder::build(&new_spec, &HashMap::new(), &self.config)
            .await
            .map_err(|e| Error::InvalidSpec(e.to_string()))?;
        let new_container_id = self.adapter.create(&spec).await?;

        new_spec.container_id = new_container_id.clone();
        new_spec.status = ServerStatus::Stopped;
        server = new_spec;

        if !old_container_id.is_empty() {
            self.logs.migrate_subscribers(&old_container_id, &new_container_id).await;
        }
        self.store.upsert(&server).await?;

        if was_running {
            self.start_locked(&mut server).await?;
            self.store.upsert(&server).await?;
        }

        Ok(RecreateOutcome {
            new_container_id,
            was_running,
        })
    }

    /// `DeleteServer(id)`: stops, removes the container, deletes the data
    /// path, deletes the persisted row, and asks the Metrics Collector to
    /// forget the id.
    #[instrument(skip(self))]
    pub async fn delete_server(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut server = self.store.get(id).await?;
        let _ = self.stop_locked(&mut server).await;

        if !server.container_id.is_empty() {
            let _ = self.adapter.remove(&server.container_id).await;
        }

        if let Err(e) = tokio::fs::remove_dir_all(&server.data_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(server_id = %id, error = %e, "failed to remove server data directory");
            }
        }

        self.store.delete(id).await?;
        self.metrics.forget(id).await;
        self.locks.lock().await.remove(id);
        Ok(())
    }

    /// Shared start path used by `StartServer`, the post-create
    /// auto-start, `RestartServer`, and `RecreateServer`. Assumes the
    /// caller holds the per-Server lock.
    async fn start_locked(&self, server: &mut Server) -> Result<()> {
        if server.container_id.is_empty() {
            server.status = ServerStatus::Error;
            return Err(Error::not_found("container", server.id.as_str()));
        }

        server.status = ServerStatus::Starting;
        if let Err(e) = self.adapter.start(&server.container_id).await {
            server.status = ServerStatus::Error;
            return Err(e);
        }

        self.logs.start_streaming(&server.container_id).await;
        server.last_started_at = Some(Utc::now());

        let inspected = self.adapter.inspect(&server.container_id).await.ok();
        if let Some(i) = &inspected {
            server.status = map_runtime_status(i.status);
        }

        if server.proxied() {
            if let Err(e) = self.publish_route(server, inspected.as_ref()).await {
                warn!(server_id = %server.id, error = %e, "failed to publish proxy route after start");
            }
        }

        self.track_metrics(server).await;
        self.dispatch(server, ModuleEvent::ServerStart).await;
        if server.status == ServerStatus::Running {
            self.dispatch(server, ModuleEvent::ServerHealthy).await;
        }

        Ok(())
    }

    /// Shared stop path. Assumes the caller holds the per-Server lock.
    /// `Ok(false)` means the container was already absent — non-fatal by
    /// policy (§7).
    async fn stop_locked(&self, server: &mut Server) -> Result<bool> {
        self.logs.stop_streaming(&server.container_id).await;
        server.status = ServerStatus::Stopping;

        let found = self.adapter.stop(&server.container_id, self.config.stop_grace).await?;
        if !found {
            server.container_id.clear();
        }
        server.status = ServerStatus::Stopped;

        if server.proxied() {
            self.routes.remove_route_for_server(&server.id).await;
        }

        self.dispatch(server, ModuleEvent::ServerStop).await;
        Ok(found)
    }

    /// Backend discovery (§4.4): for host-network Servers the backend is
    /// always loopback on the fixed game port; otherwise it's the
    /// container's address on the control-plane network, resolved via
    /// Inspect. The open question on host-mode binding semantics (§9) is
    /// left to the runtime — this only decides where the proxy dials.
    async fn publish_route(&self, server: &Server, inspected: Option<&discopanel_runtime::InspectResult>) -> Result<()> {
        let Some(vhost) = server.virtual_host.as_deref() else {
            return Ok(());
        };
        let Some(listener_id) = server.listener_id.as_deref() else {
            warn!(server_id = %server.id, "server has a virtual host but no listener id; route not published");
            return Ok(());
        };

        let backend = self.backend_endpoint(server, inspected).await?;
        self.routes.upsert_route(&server.id, vhost, listener_id, backend).await;
        Ok(())
    }

    async fn backend_endpoint(&self, server: &Server, inspected: Option<&discopanel_runtime::InspectResult>) -> Result<BackendEndpoint> {
        if server.overrides.network_mode.as_deref() == Some("host") {
            return Ok(BackendEndpoint {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: Server::DEFAULT_GAME_PORT,
            });
        }

        let owned;
        let inspected = match inspected {
            Some(i) => i,
            None => {
                owned = self.adapter.inspect(&server.container_id).await?;
                &owned
            }
        };
        let ip = inspected.network_ip(&self.config.control_plane_network).ok_or_else(|| {
            Error::RuntimeUnavailable(format!("container {} has no address on {}", server.container_id, self.config.control_plane_network))
        })?;
        Ok(BackendEndpoint {
            host: ip,
            port: Server::DEFAULT_GAME_PORT,
        })
    }

    /// Registers (or refreshes) this Server with the Metrics Collector,
    /// resolving the SLP target the same way backend discovery does.
    async fn track_metrics(&self, server: &Server) {
        let (slp_host, slp_port) = if server.proxied() {
            match self.adapter.inspect(&server.container_id).await {
                Ok(i) => match i.network_ip(&self.config.control_plane_network) {
                    Some(ip) => (ip.to_string(), Server::DEFAULT_GAME_PORT),
                    None => return,
                },
                Err(_) => return,
            }
        } else {
            ("127.0.0.1".to_owned(), server.external_port)
        };

        let target = MetricsTarget {
            server_id: server.id.clone(),
            container_id: server.container_id.clone(),
            world_dir: Path::new(&server.data_dir).join("world"),
            data_volume: Path::new(&server.data_dir).to_path_buf(),
            tps_commands: vec![
                vec!["rcon-cli".to_owned(), "tps".to_owned()],
                vec!["rcon-cli".to_owned(), "spark".to_owned(), "tps".to_owned()],
            ],
            slp_host,
            slp_port,
            game_version: server.game_version.clone(),
        };
        self.metrics.track(target).await;
    }

    /// Dispatches a Server-lifecycle event to every attached Module's
    /// hooks, when a Module Manager is attached (§4.2 control flow).
    async fn dispatch(&self, server: &Server, event: ModuleEvent) {
        let Some((manager, module_store)) = &self.modules else {
            return;
        };
        match module_store.list_for_server(&server.id).await {
            Ok(modules) if !modules.is_empty() => manager.dispatch_event(server, event, &modules).await,
            Ok(_) => {}
            Err(e) => warn!(server_id = %server.id, error = %e, "failed to load modules for event dispatch"),
        }
    }

    /// The reconciliation loop (§4.2): the sole mechanism by which
    /// `unhealthy` is observed. Never aborts on a single Server's error.
    #[instrument(skip(self))]
    pub async fn reconcile_once(&self) {
        let servers = match self.store.list().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "reconciliation: failed to list servers");
                return;
            }
        };

        for server in servers {
            if server.container_id.is_empty() {
                continue;
            }

            let observed = match self.adapter.inspect(&server.container_id).await {
                Ok(i) => map_runtime_status(i.status),
                Err(e) if e.is_not_found() => ServerStatus::Stopped,
                Err(e) => {
                    warn!(server_id = %server.id, error = %e, "reconciliation: inspect failed, leaving status unchanged");
                    continue;
                }
            };

            if observed == server.status {
                continue;
            }

            let lock = self.lock_for(&server.id).await;
            let _guard = lock.lock().await;

            // Another transition may have completed while we waited for
            // the lock; re-read before overwriting.
            let mut current = match self.store.get(&server.id).await {
                Ok(s) => s,
                Err(_) => continue,
            };
            if current.status == observed {
                continue;
            }

            let became_running = observed == ServerStatus::Running && current.status != ServerStatus::Running;
            current.status = observed;
            if let Err(e) = self.store.upsert(&current).await {
                error!(server_id = %server.id, error = %e, "reconciliation: failed to persist observed status");
                continue;
            }
            info!(server_id = %server.id, ?observed, "reconciliation updated server status");

            if became_running {
                self.dispatch(&current, ModuleEvent::ServerHealthy).await;
            }
        }
    }

    /// Runs the reconciliation ticker until `shutdown` is cancelled.
    pub async fn run_reconciliation(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.reconciliation_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.reconcile_once().await,
            }
        }
    }

    /// The startup sequence (§4.2, steps 2-3 and 5): ensures the
    /// control-plane network, cleans up orphaned containers, then
    /// auto-starts eligible Servers on staggered background tasks. Step 1
    /// (opening the store/adapter) and step 4 (starting the Proxy) are the
    /// hosting binary's responsibility, since the Controller depends on
    /// the Route Registry but not the Proxy itself. Step 6 (the
    /// reconciliation ticker) is `run_reconciliation`, started separately
    /// so the caller controls its lifetime relative to the Proxy's.
    #[instrument(skip(self))]
    pub async fn startup(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        self.adapter.ensure_network(&self.config.control_plane_network).await?;

        let servers = self.store.list().await?;
        let tracked: HashSet<String> = servers.iter().filter(|s| !s.container_id.is_empty()).map(|s| s.container_id.clone()).collect();
        if let Err(e) = self.adapter.cleanup_orphans(&tracked).await {
            warn!(error = %e, "startup: orphan cleanup failed");
        }

        let autostart: Vec<Server> = servers.into_iter().filter(|s| s.autostart && !s.detached).collect();
        for (i, server) in autostart.into_iter().enumerate() {
            let controller = self.clone();
            let shutdown = shutdown.clone();
            let jitter_ms: u64 = rand::thread_rng().gen_range(0..50);
            let delay = self.config.autostart_stagger * i as u32 + Duration::from_millis(jitter_ms);
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        if let Err(e) = controller.start_server(&server.id).await {
                            error!(server_id = %server.id, error = %e, "startup: autostart failed");
                        }
                    }
                }
            });
        }

        Ok(())
    }

    /// The shutdown sequence (§4.2, steps 3-4 within the caller's overall
    /// 30 s budget): stops every non-detached Server currently running.
    /// Stopping the Proxy and reconciliation ticker (steps 1-2) are the
    /// caller's responsibility since it owns their cancellation tokens.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, budget: Duration) {
        let deadline = tokio::time::Instant::now() + budget;
        let servers = match self.store.list().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "shutdown: failed to list servers");
                return;
            }
        };

        for server in servers.into_iter().filter(|s| !s.detached && s.status != ServerStatus::Stopped) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                warn!(server_id = %server.id, "shutdown budget exhausted; leaving remaining servers running");
                break;
            }

            let lock = self.lock_for(&server.id).await;
            let _guard = lock.lock().await;
            let mut current = match self.store.get(&server.id).await {
                Ok(s) => s,
                Err(_) => continue,
            };

            match tokio::time::timeout(remaining, self.stop_locked(&mut current)).await {
                Ok(Ok(_)) => {
                    let _ = self.store.upsert(&current).await;
                }
                Ok(Err(e)) => error!(server_id = %server.id, error = %e, "shutdown: stop failed"),
                Err(_) => warn!(server_id = %server.id, "shutdown: stop exceeded remaining budget"),
            }
        }
    }
}

fn map_runtime_status(status: RuntimeStatus) -> ServerStatus {
    match status {
        RuntimeStatus::Running => ServerStatus::Running,
        RuntimeStatus::Starting => ServerStatus::Starting,
        RuntimeStatus::Unhealthy => ServerStatus::Unhealthy,
        RuntimeStatus::Stopped => ServerStatus::Stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_runtime::mock::MockAdapter;
    use discopanel_types::{Loader, RuntimeOverrides};

    fn server(id: &str) -> Server {
        Server {
            id: id.to_owned(),
            display_name: "Survival".into(),
            loader: Loader::Vanilla,
            game_version: "1.20.1".into(),
            memory_mb: 2048,
            max_players: 20,
            external_port: 25565,
            additional_ports: vec![],
            image: "latest".into(),
            container_id: String::new(),
            status: ServerStatus::Stopped,
            last_started_at: None,
            data_dir: format!("/tmp/discopanel-test-{id}"),
            virtual_host: None,
            listener_id: None,
            autostart: false,
            detached: false,
            overrides: RuntimeOverrides::default(),
        }
    }

    fn proxied_server(id: &str) -> Server {
        let mut s = server(id);
        s.external_port = 0;
        s.virtual_host = Some("survival".into());
        s.listener_id = Some("l1".into());
        s
    }

    async fn harness() -> (Arc<ServerController>, Arc<MockAdapter>, Arc<discopanel_routes::RouteRegistry>, Arc<LogStreamer>) {
        let adapter = MockAdapter::new();
        let store: Arc<dyn ServerStore> = Arc::new(crate::store::InMemoryServerStore::default());
        let logs = LogStreamer::new(adapter.clone(), Default::default());
        let routes = Arc::new(RouteRegistry::new());
        let metrics = MetricsCollector::new(adapter.clone(), Default::default());
        let controller = ServerController::new(adapter.clone(), store, logs.clone(), routes.clone(), metrics, None, ControllerConfig::default());
        (controller, adapter, routes, logs)
    }

    #[tokio::test]
    async fn create_and_start_transitions_to_running_and_publishes_route() {
        let (controller, adapter, routes, _logs) = harness().await;
        let created = controller.create_server(proxied_server("s1"), true).await.unwrap();

        assert!(!created.container_id.is_empty());
        assert_eq!(created.status, ServerStatus::Running);
        assert!(adapter.contains(&created.container_id).await);

        let route = routes.lookup("l1", "survival").await.unwrap();
        assert_eq!(route.server_id, "s1");
    }

    #[tokio::test]
    async fn stop_server_handles_absent_container_as_success() {
        let (controller, adapter, _routes, _logs) = harness().await;
        let created = controller.create_server(server("s1"), true).await.unwrap();

        // Simulate the container vanishing out from under the controller.
        adapter.remove(&created.container_id).await.unwrap();

        let stopped = controller.stop_server("s1").await.unwrap();
        assert_eq!(stopped.status, ServerStatus::Stopped);
        assert!(stopped.container_id.is_empty());
    }

    #[tokio::test]
    async fn recreate_server_migrates_subscribers_with_fresh_sequence() {
        let (controller, _adapter, _routes, logs) = harness().await;
        let created = controller.create_server(server("s1"), true).await.unwrap();
        let old_container = created.container_id.clone();

        let sub = logs.subscribe(&old_container).await;

        let outcome = controller.recreate_server("s1", server("s1")).await.unwrap();
        assert!(outcome.was_running);
        assert_ne!(outcome.new_container_id, old_container);

        // The subscription made against the old container id should now be
        // registered against the new one.
        logs.add_command_entry(&outcome.new_container_id, "say hi", Utc::now()).await;
        let entry = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("subscriber should receive the migrated entry")
            .expect("stream should not be closed");
        assert_eq!(entry.text, "say hi");
    }

    #[tokio::test]
    async fn recreate_server_starts_new_container_only_if_old_was_running() {
        let (controller, _adapter, _routes, _logs) = harness().await;
        controller.create_server(server("s1"), false).await.unwrap();

        let outcome = controller.recreate_server("s1", server("s1")).await.unwrap();
        assert!(!outcome.was_running);

        let after = controller.store.get("s1").await.unwrap();
        assert_eq!(after.status, ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn reconcile_once_updates_status_from_runtime() {
        let (controller, adapter, _routes, _logs) = harness().await;
        let created = controller.create_server(server("s1"), true).await.unwrap();

        adapter.set_status(&created.container_id, RuntimeStatus::Unhealthy).await;
        controller.reconcile_once().await;

        let after = controller.store.get("s1").await.unwrap();
        assert_eq!(after.status, ServerStatus::Unhealthy);
    }

    #[tokio::test]
    async fn startup_autostarts_eligible_servers_and_skips_detached() {
        let (controller, adapter, _routes, _logs) = harness().await;
        let mut autostart = server("s1");
        autostart.autostart = true;
        controller.create_server(autostart, false).await.unwrap();

        let mut detached = server("s2");
        detached.autostart = false;
        detached.detached = true;
        controller.create_server(detached, false).await.unwrap();

        let shutdown = CancellationToken::new();
        controller.clone().startup(shutdown.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let s1 = controller.store.get("s1").await.unwrap();
        assert_eq!(s1.status, ServerStatus::Running);
        assert!(adapter.contains(&s1.container_id).await);

        let s2 = controller.store.get("s2").await.unwrap();
        assert_eq!(s2.status, ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn shutdown_stops_non_detached_running_servers_within_budget() {
        let (controller, _adapter, _routes, _logs) = harness().await;
        controller.create_server(server("s1"), true).await.unwrap();

        let mut detached = server("s2");
        detached.detached = true;
        controller.create_server(detached, false).await.unwrap();

        controller.shutdown(Duration::from_secs(5)).await;

        let s1 = controller.store.get("s1").await.unwrap();
        assert_eq!(s1.status, ServerStatus::Stopped);
    }
}
