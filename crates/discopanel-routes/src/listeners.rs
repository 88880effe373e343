use std::collections::HashMap;

use discopanel_types::Listener;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// Emitted whenever a Listener is added, toggled, or removed, so the Proxy
/// can start/stop accept loops without dropping unrelated connections.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    Upserted(Listener),
    Removed(String),
}

pub struct ListenerSet {
    inner: RwLock<HashMap<String, Listener>>,
    events: broadcast::Sender<ListenerEvent>,
}

impl Default for ListenerSet {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(HashMap::new()),
            events,
        }
    }
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events.subscribe()
    }

    /// At most one Listener may be `default`; upserting a default listener
    /// clears the flag on every other one.
    pub async fn upsert(&self, listener: Listener) {
        let mut inner = self.inner.write().await;
        if listener.default {
            for other in inner.values_mut() {
                if other.id != listener.id {
                    other.default = false;
                }
            }
        }
        inner.insert(listener.id.clone(), listener.clone());
        drop(inner);

        if self.events.send(ListenerEvent::Upserted(listener)).is_err() {
            warn!("no subscribers for listener event; proxy accept loop may not be running yet");
        }
    }

    pub async fn remove(&self, id: &str) {
        let removed = self.inner.write().await.remove(id).is_some();
        if removed {
            let _ = self.events.send(ListenerEvent::Removed(id.to_owned()));
        }
    }

    pub async fn get(&self, id: &str) -> Option<Listener> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Listener> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn default_listener(&self) -> Option<Listener> {
        self.inner.read().await.values().find(|l| l.default).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(id: &str, port: u16, default: bool) -> Listener {
        Listener {
            id: id.to_owned(),
            port,
            name: id.to_owned(),
            enabled: true,
            default,
        }
    }

    #[tokio::test]
    async fn at_most_one_default_listener() {
        let set = ListenerSet::new();
        set.upsert(listener("a", 25565, true)).await;
        set.upsert(listener("b", 25566, true)).await;

        let a = set.get("a").await.unwrap();
        let b = set.get("b").await.unwrap();
        assert!(!a.default);
        assert!(b.default);
    }

    #[tokio::test]
    async fn removing_emits_event() {
        let set = ListenerSet::new();
        let mut rx = set.subscribe();
        set.upsert(listener("a", 25565, false)).await;
        set.remove("a").await;

        let _ = rx.recv().await.unwrap();
        let evt = rx.recv().await.unwrap();
        assert!(matches!(evt, ListenerEvent::Removed(id) if id == "a"));
    }
}
