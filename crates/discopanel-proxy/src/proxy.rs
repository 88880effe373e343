use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use discopanel_routes::{ListenerEvent, ListenerSet, RouteRegistry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::config::ProxyConfig;
use crate::connection::handle_connection;
use crate::metrics::ProxyMetrics;

/// One accept loop per enabled Listener; loops start and stop as Listeners
/// are enabled/disabled at runtime without dropping unrelated connections.
pub struct Proxy {
    routes: Arc<RouteRegistry>,
    listeners: Arc<ListenerSet>,
    config: ProxyConfig,
    metrics: Arc<ProxyMetrics>,
    /// Tracks every spawned connection handler so shutdown can drain them.
    tracker: TaskTracker,
}

impl Proxy {
    pub fn new(routes: Arc<RouteRegistry>, listeners: Arc<ListenerSet>, config: ProxyConfig) -> Arc<Self> {
        Arc::new(Self {
            routes,
            listeners,
            config,
            metrics: Arc::new(ProxyMetrics::default()),
            tracker: TaskTracker::new(),
        })
    }

    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        self.metrics.clone()
    }

    /// Runs the proxy until `shutdown` is cancelled. Owns exactly one
    /// accept loop per enabled listener and reacts to listener set changes.
    pub async fn serve(self: Arc<Self>, shutdown: CancellationToken) {
        let mut accept_tokens: HashMap<String, CancellationToken> = HashMap::new();
        let mut events = self.listeners.subscribe();

        for listener in self.listeners.list().await {
            if listener.enabled {
                let token = CancellationToken::new();
                self.clone().spawn_accept_loop(listener.id.clone(), listener.port, token.clone());
                accept_tokens.insert(listener.id, token);
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("proxy shutting down: refusing new connections");
                    for (_, token) in accept_tokens.drain() {
                        token.cancel();
                    }
                    break;
                }
                event = events.recv() => {
                    match event {
                        Ok(ListenerEvent::Upserted(listener)) => {
                            if let Some(token) = accept_tokens.remove(&listener.id) {
                                token.cancel();
                            }
                            if listener.enabled {
                                let token = CancellationToken::new();
                                self.clone().spawn_accept_loop(listener.id.clone(), listener.port, token.clone());
                                accept_tokens.insert(listener.id, token);
                            }
                        }
                        Ok(ListenerEvent::Removed(id)) => {
                            if let Some(token) = accept_tokens.remove(&id) {
                                token.cancel();
                            }
                        }
                        Err(_) => {
                            warn!("listener event channel closed; proxy will no longer react to listener changes");
                        }
                    }
                }
            }
        }
    }

    /// Waits up to `budget` for every in-flight connection to finish
    /// draining after `serve` has stopped accepting new ones.
    pub async fn drain(&self, budget: Duration) {
        self.tracker.close();
        if tokio::time::timeout(budget, self.tracker.wait()).await.is_err() {
            warn!("proxy drain budget exceeded; remaining connections dropped");
        }
    }

    fn spawn_accept_loop(self: Arc<Self>, listener_id: String, port: u16, cancel: CancellationToken) {
        tokio::spawn(async move {
            let bind_addr = format!("0.0.0.0:{port}");
            let listener = match TcpListener::bind(&bind_addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(%bind_addr, error = %e, "failed to bind proxy listener");
                    return;
                }
            };
            info!(%bind_addr, listener_id = %listener_id, "proxy accept loop started");

            let listener_id: Arc<str> = Arc::from(listener_id.as_str());

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(listener_id = %listener_id, "proxy accept loop stopped");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, remote_addr)) => {
                                let routes = self.routes.clone();
                                let config = self.config;
                                let metrics = self.metrics.clone();
                                let listener_id = listener_id.clone();
                                self.tracker.spawn(async move {
                                    handle_connection(stream, remote_addr, listener_id, routes, config, metrics).await;
                                });
                            }
                            Err(e) => {
                                error!(error = %e, "failed to accept incoming connection");
                            }
                        }
                    }
                }
            }
        });
    }
}
