//! Wires the Server Controller, TCP Proxy, Module Manager, and Metrics
//! Collector into one running core (§2 System Overview, §4.2
//! startup/shutdown sequences), generic over the Runtime Adapter so the
//! wiring itself is testable against `discopanel_runtime::mock::MockAdapter`
//! without a live Docker daemon.

use std::sync::Arc;
use std::time::Duration;

use discopanel_controller::{ControllerConfig, InMemoryServerStore, ServerController};
use discopanel_logs::{LogStreamer, LogStreamerConfig};
use discopanel_metrics::{MetricsCollector, MetricsConfig};
use discopanel_modules::{InMemoryModuleStore, InMemoryTemplateStore, ModuleManager, ModuleManagerConfig, ModuleStore};
use discopanel_proxy::{Proxy, ProxyConfig};
use discopanel_routes::{ListenerSet, RouteRegistry};
use discopanel_runtime::RuntimeAdapter;
use discopanel_types::Listener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BootstrapConfig;

/// Every long-running handle the `discopanel` process needs to hold onto
/// for its shutdown sequence.
pub(crate) struct Core {
    pub(crate) controller: Arc<ServerController>,
    pub(crate) proxy: Arc<Proxy>,
    pub(crate) metrics: Arc<MetricsCollector>,
    pub(crate) reconciliation: tokio::task::JoinHandle<()>,
    pub(crate) metrics_task: tokio::task::JoinHandle<()>,
    pub(crate) proxy_task: tokio::task::JoinHandle<()>,
}

/// Builds every component from §2's control-flow description and runs the
/// startup sequence (§4.2) against it. Returns once the background tickers
/// and the proxy's accept loops are spawned; the caller decides when to
/// cancel `shutdown` and drive the shutdown sequence.
pub(crate) async fn build_and_run(adapter: Arc<dyn RuntimeAdapter>, bootstrap: &BootstrapConfig, shutdown: CancellationToken) -> anyhow::Result<Core> {
    adapter.ensure_network(&bootstrap.control_plane_network).await?;

    let server_store = Arc::new(InMemoryServerStore::default());
    let module_store = Arc::new(InMemoryModuleStore::default());
    let template_store = Arc::new(InMemoryTemplateStore::default());

    let logs = LogStreamer::new(adapter.clone(), LogStreamerConfig::default());
    let routes = Arc::new(RouteRegistry::new());
    let listeners = Arc::new(ListenerSet::new());
    let metrics = MetricsCollector::new(adapter.clone(), MetricsConfig::default());

    listeners
        .upsert(Listener {
            id: "default".to_owned(),
            port: bootstrap.default_listener_port,
            name: "default".to_owned(),
            enabled: true,
            default: true,
        })
        .await;

    let modules = ModuleManager::new(
        adapter.clone(),
        logs.clone(),
        routes.clone(),
        module_store.clone(),
        template_store,
        ModuleManagerConfig {
            control_plane_network: bootstrap.control_plane_network.clone(),
        },
    );

    let controller = ServerController::new(
        adapter.clone(),
        server_store,
        logs,
        routes.clone(),
        metrics.clone(),
        Some((modules, module_store as Arc<dyn ModuleStore>)),
        ControllerConfig {
            control_plane_network: bootstrap.control_plane_network.clone(),
            ..ControllerConfig::default()
        },
    );

    let proxy = Proxy::new(routes, listeners, ProxyConfig::default());

    controller.clone().startup(shutdown.clone()).await?;

    let reconciliation = tokio::spawn(controller.clone().run_reconciliation(shutdown.clone()));
    let metrics_task = tokio::spawn(metrics.clone().run(shutdown.clone()));
    let proxy_task = tokio::spawn(proxy.clone().serve(shutdown.clone()));

    info!(port = bootstrap.default_listener_port, "discopanel core is up");

    Ok(Core {
        controller,
        proxy,
        metrics,
        reconciliation,
        metrics_task,
        proxy_task,
    })
}

/// Runs the shutdown sequence (§4.2) against an already-running `Core`:
/// stop the proxy first, drain in-flight connections, then stop every
/// non-detached running Server within what's left of `budget`.
pub(crate) async fn shutdown(core: Core, shutdown: &CancellationToken, budget: Duration) {
    let deadline = tokio::time::Instant::now() + budget;
    shutdown.cancel();

    core.proxy.drain(Duration::from_secs(5)).await;

    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
    core.controller.shutdown(remaining).await;

    for task in [core.reconciliation, core.metrics_task, core.proxy_task] {
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_runtime::mock::MockAdapter;

    fn bootstrap() -> BootstrapConfig {
        BootstrapConfig {
            data_root: std::env::temp_dir(),
            default_listener_port: 0,
            control_plane_network: "discopanel-test".to_owned(),
        }
    }

    #[tokio::test]
    async fn builds_and_shuts_down_cleanly() {
        let adapter = MockAdapter::new();
        let shutdown_token = CancellationToken::new();

        let core = build_and_run(adapter, &bootstrap(), shutdown_token.clone()).await.unwrap();
        assert_eq!(core.metrics.snapshot_all().await.len(), 0);

        shutdown(core, &shutdown_token, Duration::from_secs(5)).await;
        assert!(shutdown_token.is_cancelled());
    }
}
