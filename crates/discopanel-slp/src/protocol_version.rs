//! A small static table mapping a game version string to its protocol
//! version number, with a best-effort-latest fallback for versions the
//! table doesn't know about yet.

/// Protocol version used when `game_version` isn't in the table below.
pub const LATEST_PROTOCOL_VERSION: i32 = 767;

const VERSION_TABLE: &[(&str, i32)] = &[
    ("1.8", 47),
    ("1.8.9", 47),
    ("1.9", 107),
    ("1.9.4", 110),
    ("1.10.2", 210),
    ("1.11.2", 316),
    ("1.12.2", 340),
    ("1.13.2", 404),
    ("1.14.4", 498),
    ("1.15.2", 578),
    ("1.16.5", 754),
    ("1.17.1", 756),
    ("1.18.2", 758),
    ("1.19", 759),
    ("1.19.2", 760),
    ("1.19.3", 761),
    ("1.19.4", 762),
    ("1.20", 763),
    ("1.20.1", 763),
    ("1.20.2", 764),
    ("1.20.3", 765),
    ("1.20.4", 765),
    ("1.20.6", 766),
    ("1.21", 767),
    ("1.21.1", 767),
];

pub fn protocol_version_for(game_version: &str) -> i32 {
    VERSION_TABLE
        .iter()
        .find(|(v, _)| *v == game_version)
        .map(|(_, p)| *p)
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_version_maps_exactly() {
        assert_eq!(protocol_version_for("1.20.1"), 763);
    }

    #[test]
    fn unknown_version_falls_back_to_latest() {
        assert_eq!(protocol_version_for("1.99"), LATEST_PROTOCOL_VERSION);
    }
}
