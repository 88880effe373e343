//! Port binding policy (§4.1): when a Server has a virtual hostname, the
//! proxy handles ingress and the game port is not bound on the host;
//! otherwise the game port and RCON port are both host-bound.

use discopanel_types::Server;

use crate::spec::PortBinding;

/// Builds the game-port and RCON-port bindings for a Server, per the
/// `proxied()` / `external_port` policy in §4.1.
pub fn game_and_rcon_bindings(server: &Server) -> Vec<PortBinding> {
    if server.proxied() {
        return vec![
            PortBinding {
                container_port: Server::DEFAULT_GAME_PORT,
                protocol: "tcp",
                host_ip: None,
                host_port: None,
            },
            PortBinding {
                container_port: Server::DEFAULT_RCON_PORT,
                protocol: "tcp",
                host_ip: Some("127.0.0.1".to_owned()),
                host_port: None,
            },
        ];
    }

    vec![
        PortBinding {
            container_port: Server::DEFAULT_GAME_PORT,
            protocol: "tcp",
            host_ip: None,
            host_port: Some(server.external_port),
        },
        PortBinding {
            container_port: Server::DEFAULT_RCON_PORT,
            protocol: "tcp",
            host_ip: Some("127.0.0.1".to_owned()),
            host_port: Some(server.external_port + 10),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_types::{Loader, RuntimeOverrides, ServerStatus};

    fn base_server() -> Server {
        Server {
            id: "s1".into(),
            display_name: "Survival".into(),
            loader: Loader::Vanilla,
            game_version: "1.20.1".into(),
            memory_mb: 2048,
            max_players: 20,
            external_port: 25565,
            additional_ports: vec![],
            image: "itzg/minecraft-server:latest".into(),
            container_id: String::new(),
            status: ServerStatus::Stopped,
            last_started_at: None,
            data_dir: "/data/servers/s1".into(),
            virtual_host: None,
            listener_id: None,
            autostart: false,
            detached: false,
            overrides: RuntimeOverrides::default(),
        }
    }

    #[test]
    fn non_proxied_server_binds_game_and_rcon_on_host() {
        let server = base_server();
        let bindings = game_and_rcon_bindings(&server);
        assert_eq!(bindings[0].host_port, Some(25565));
        assert_eq!(bindings[1].host_port, Some(25575));
        assert_eq!(bindings[1].host_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn proxied_server_does_not_bind_game_port() {
        let mut server = base_server();
        server.virtual_host = Some("survival".into());
        server.external_port = 0;
        let bindings = game_and_rcon_bindings(&server);
        assert_eq!(bindings[0].host_port, None);
        assert_eq!(bindings[1].host_port, None);
    }
}
