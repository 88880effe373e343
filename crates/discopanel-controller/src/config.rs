use std::time::Duration;

/// Tunables for the Server Controller (§4.2, §D).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often the reconciliation loop lists Servers and re-syncs status.
    pub reconciliation_interval: Duration,
    /// Grace period `StopServer` gives a container before the Runtime
    /// Adapter escalates to a kill.
    pub stop_grace: Duration,
    /// Delay between each autostart Server's launch during the startup
    /// sequence, so a full fleet restart doesn't thunder against the
    /// runtime all at once.
    pub autostart_stagger: Duration,
    /// The control-plane network every Server container is attached to.
    pub control_plane_network: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciliation_interval: Duration::from_secs(30),
            stop_grace: Duration::from_secs(5),
            autostart_stagger: Duration::from_millis(500),
            control_plane_network: "discopanel".to_owned(),
        }
    }
}
