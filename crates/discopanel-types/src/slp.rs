use serde::{Deserialize, Serialize};

/// The result of a successful outbound Server List Ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlpResult {
    pub version_name: String,
    pub protocol_version: i32,
    pub online_players: i32,
    pub max_players: i32,
    pub player_sample: Vec<String>,
    /// Flattened plain-text MOTD (chat component tree already flattened).
    pub motd: String,
    pub favicon: Option<String>,
    pub latency_ms: u64,
}
