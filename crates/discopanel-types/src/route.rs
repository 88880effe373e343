use serde::{Deserialize, Serialize};

/// A host TCP port the Proxy accepts connections on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub id: String,
    pub port: u16,
    pub name: String,
    pub enabled: bool,
    pub default: bool,
}

/// A backend endpoint a Route forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub host: std::net::IpAddr,
    pub port: u16,
}

impl std::fmt::Display for BackendEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The mapping from a virtual host on a given listener to a backend, unique
/// by (listener_id, vhost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub server_id: String,
    /// Always lowercased on construction.
    pub vhost: String,
    pub backend: BackendEndpoint,
    pub listener_id: String,
    pub active: bool,
}

impl Route {
    pub fn new(server_id: impl Into<String>, vhost: impl Into<String>, listener_id: impl Into<String>, backend: BackendEndpoint) -> Self {
        Self {
            server_id: server_id.into(),
            vhost: vhost.into().to_lowercase(),
            listener_id: listener_id.into(),
            backend,
            active: true,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.listener_id.clone(), self.vhost.clone())
    }
}
