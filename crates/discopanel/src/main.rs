//! The `discopanel` control-plane process: wires the Server Controller,
//! TCP Proxy, Module Manager, and Metrics Collector into one running core
//! (§2 System Overview, §4.2 startup/shutdown sequences).
//!
//! The HTTP/RPC API, the UI, and the persistent store are external
//! collaborators (§1); this binary runs the core against an in-memory
//! store and a real Docker runtime so the subsystems above can be driven
//! and observed end to end.

mod config;
mod core;

use std::sync::Arc;
use std::time::Duration;

use discopanel_runtime::DockerAdapter;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Overall budget for the shutdown sequence (§4.2 step 5).
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let bootstrap = config::BootstrapConfig::from_env();
    tokio::fs::create_dir_all(&bootstrap.data_root).await?;

    let adapter: Arc<dyn discopanel_runtime::RuntimeAdapter> = Arc::new(DockerAdapter::connect()?);
    let shutdown = CancellationToken::new();

    let running = core::build_and_run(adapter, &bootstrap, shutdown.clone()).await?;

    wait_for_shutdown_signal().await;
    info!("shutdown signal received; draining within {:?}", SHUTDOWN_BUDGET);

    core::shutdown(running, &shutdown, SHUTDOWN_BUDGET).await;

    info!("discopanel core shut down");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
