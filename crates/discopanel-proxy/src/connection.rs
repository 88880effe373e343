use std::net::SocketAddr;
use std::sync::Arc;

use discopanel_proto::{normalize_vhost, read_handshake, NextState};
use discopanel_routes::RouteRegistry;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::config::ProxyConfig;
use crate::metrics::ProxyMetrics;
use crate::splice::splice;

/// Handles one accepted connection end to end: sniff the handshake, look up
/// the route, dial the backend, replay the captured bytes, then splice.
/// Never panics or propagates an error upward — every failure path simply
/// drops the client, per the proxy's silent-failure policy.
pub async fn handle_connection(
    mut client: TcpStream,
    remote_addr: SocketAddr,
    listener_id: Arc<str>,
    routes: Arc<RouteRegistry>,
    config: ProxyConfig,
    metrics: Arc<ProxyMetrics>,
) {
    let _ = client.set_nodelay(true);

    let handshake_result = tokio::time::timeout(config.handshake_deadline, read_handshake(&mut client)).await;

    let (handshake, raw) = match handshake_result {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            debug!(%remote_addr, error = %e, "dropping connection: malformed handshake");
            metrics.handshake_errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        }
        Err(_) => {
            debug!(%remote_addr, "dropping connection: handshake read timed out");
            metrics.handshake_timeouts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        }
    };

    if !matches!(handshake.next_state, NextState::Status | NextState::Login | NextState::Transfer) {
        return;
    }

    let vhost = normalize_vhost(&handshake.server_address);
    trace!(%remote_addr, %vhost, "handshake captured");

    let route = match routes.lookup(&listener_id, &vhost).await {
        Some(r) if r.active => r,
        _ => {
            debug!(%remote_addr, %vhost, "dropping connection: no active route for vhost");
            metrics.unknown_vhost.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        }
    };

    let backend = match TcpStream::connect((route.backend.host, route.backend.port)).await {
        Ok(s) => s,
        Err(e) => {
            warn!(%remote_addr, backend = %route.backend, error = %e, "dropping client: backend dial failed");
            metrics.backend_dial_failures.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        }
    };

    let mut backend = backend;
    if let Err(e) = backend.write_all(&raw).await {
        warn!(%remote_addr, error = %e, "dropping client: failed to replay handshake to backend");
        return;
    }

    metrics.connections_routed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    splice(client, backend, config.splice_buffer_size).await;
}
