//! Parsing for the two Exec-sampled text formats the RCON ticker consumes:
//! the vanilla/Paper/Spigot `list` command's player-count line, and a
//! per-server-configured TPS command whose output format varies by plugin.

use std::sync::OnceLock;

use regex::Regex;

fn player_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"There are (\d+) of a max(?: of)? (\d+) players online").expect("valid regex"))
}

fn first_float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+\.\d+").expect("valid regex"))
}

/// Parses vanilla/Paper/Spigot's `"There are N of a max of M players
/// online: ..."` line, returning `(online, max)`.
pub fn parse_player_count(text: &str) -> Option<(u32, u32)> {
    let caps = player_count_re().captures(text)?;
    let online = caps.get(1)?.as_str().parse().ok()?;
    let max = caps.get(2)?.as_str().parse().ok()?;
    Some((online, max))
}

/// Extracts the first floating-point number in `text`, the representative
/// TPS value regardless of which plugin's output format produced it.
pub fn parse_tps(text: &str) -> Option<f64> {
    first_float_re().find(text)?.as_str().parse().ok()
}
