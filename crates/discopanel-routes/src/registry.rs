use std::collections::HashMap;

use discopanel_types::{BackendEndpoint, Route};
use tokio::sync::RwLock;

type RouteKey = (String, String);

#[derive(Default)]
struct Inner {
    routes: HashMap<RouteKey, Route>,
    by_server: HashMap<String, RouteKey>,
}

/// Maps `(listener, vhost)` to a backend endpoint. The sole writer of
/// `Route::active`; read on every accepted proxy connection, written on
/// Server start/stop/hostname change.
#[derive(Default)]
pub struct RouteRegistry {
    inner: RwLock<Inner>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique by `(vhost, listener_id)`; replaces any existing route for the
    /// same server id (a server has at most one published route).
    pub async fn upsert_route(&self, server_id: &str, vhost: &str, listener_id: &str, backend: BackendEndpoint) -> Route {
        let route = Route::new(server_id, vhost, listener_id, backend);
        let key = route.key();

        let mut inner = self.inner.write().await;
        if let Some(old_key) = inner.by_server.remove(server_id) {
            if old_key != key {
                inner.routes.remove(&old_key);
            }
        }
        inner.by_server.insert(server_id.to_owned(), key.clone());
        inner.routes.insert(key, route.clone());
        route
    }

    pub async fn remove_route_for_server(&self, server_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(key) = inner.by_server.remove(server_id) {
            inner.routes.remove(&key);
        }
    }

    /// O(1) lookup by `(listener_id, lower(vhost))`.
    pub async fn lookup(&self, listener_id: &str, vhost: &str) -> Option<Route> {
        let key = (listener_id.to_owned(), vhost.to_lowercase());
        self.inner.read().await.routes.get(&key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.routes.len()
    }
}
