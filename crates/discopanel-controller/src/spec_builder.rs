//! Flattens a `Server` plus its `RuntimeOverrides` into the `ContainerSpec`
//! the Runtime Adapter's `Create` takes, the way §4.2's `CreateServer` must
//! before it can call `Create`.

use std::collections::HashMap;

use discopanel_alias::{substitute, Context};
use discopanel_runtime::init_script::translate_to_host_path;
use discopanel_runtime::labels::server_labels;
use discopanel_runtime::ports::game_and_rcon_bindings;
use discopanel_runtime::{image, init_script, BindMount, ContainerSpec, LogDriverConfig};
use discopanel_types::Server;

use crate::config::ControllerConfig;

/// A fixed loopback-only RCON credential: the RCON port is only ever bound
/// to `127.0.0.1` (see `ports::game_and_rcon_bindings`), so this is reached
/// exclusively by the Metrics Collector and Module Manager running
/// alongside it, not by the network.
const RCON_PASSWORD: &str = "discopanel-internal";

fn base_env(server: &Server) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("EULA".to_owned(), "TRUE".to_owned());
    env.insert("TYPE".to_owned(), server.loader.as_str().to_owned());
    env.insert("VERSION".to_owned(), server.game_version.clone());
    env.insert("MEMORY".to_owned(), format!("{}M", server.memory_mb));
    env.insert("MAX_PLAYERS".to_owned(), server.max_players.to_string());
    env.insert("SERVER_PORT".to_owned(), Server::DEFAULT_GAME_PORT.to_string());
    env.insert("RCON_PORT".to_owned(), Server::DEFAULT_RCON_PORT.to_string());
    env.insert("ENABLE_RCON".to_owned(), "TRUE".to_owned());
    env.insert("RCON_PASSWORD".to_owned(), RCON_PASSWORD.to_owned());
    env
}

/// Builds the `ContainerSpec` for `server`, merging in `server_config_env`
/// (the rendered `ServerConfig` table, if one is attached) ahead of the
/// Server's own `RuntimeOverrides.extra_env`, which always wins. Every
/// value is alias-substituted, so overrides can reference `{{server.*}}`.
pub async fn build(server: &Server, server_config_env: &HashMap<String, String>, config: &ControllerConfig) -> std::io::Result<ContainerSpec> {
    let ctx = Context::new(server, server_config_env);

    let mut env = base_env(server);
    env.extend(server_config_env.clone());
    env.extend(server.overrides.extra_env.clone());
    let env: HashMap<String, String> = env.into_iter().map(|(k, v)| (k, substitute(&v, &ctx))).collect();

    let mut mounts = vec![BindMount {
        source: translate_to_host_path(std::path::Path::new(&server.data_dir)).to_string_lossy().into_owned(),
        target: "/data".to_owned(),
        read_only: false,
    }];
    for m in &server.overrides.extra_mounts {
        mounts.push(BindMount {
            source: translate_to_host_path(std::path::Path::new(&substitute(&m.source, &ctx))).to_string_lossy().into_owned(),
            target: substitute(&m.target, &ctx),
            read_only: m.read_only,
        });
    }

    let mut entrypoint = server.overrides.entrypoint.clone();
    if !server.overrides.init_commands.is_empty() {
        let data_dir = std::path::Path::new(&server.data_dir);
        let (mount, wrapped_entrypoint) =
            init_script::prepare(data_dir, &server.overrides.init_commands, entrypoint.as_deref().unwrap_or_default()).await?;
        mounts.push(mount);
        entrypoint = Some(wrapped_entrypoint);
    }

    let mut ports = game_and_rcon_bindings(server);
    ports.extend(ContainerSpec::additional_port_bindings(&server.additional_ports));

    Ok(ContainerSpec {
        name: format!("discopanel-server-{}", server.id),
        image: image::resolve_image_ref(&server.image),
        env,
        labels: server_labels(server, &server.overrides.labels),
        command: server.overrides.command.clone(),
        entrypoint,
        mounts,
        ports,
        network: server.overrides.network_mode.clone().unwrap_or_else(|| config.control_plane_network.clone()),
        cpu_limit_cores: server.overrides.cpu_limit_cores,
        memory_limit_mb: server.overrides.memory_limit_mb.or(Some(server.memory_mb)),
        restart_policy: server.overrides.restart_policy.clone(),
        cap_add: server.overrides.cap_add.clone(),
        cap_drop: server.overrides.cap_drop.clone(),
        devices: server.overrides.devices.clone(),
        extra_hosts: server.overrides.extra_hosts.clone(),
        privileged: server.overrides.privileged,
        read_only_rootfs: server.overrides.read_only_rootfs,
        security_opt: server.overrides.security_opt.clone(),
        shm_size_mb: server.overrides.shm_size_mb,
        user: server.overrides.user.clone(),
        working_dir: server.overrides.working_dir.clone(),
        log_driver: LogDriverConfig::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_types::{Loader, RuntimeOverrides, ServerStatus};

    fn server() -> Server {
        Server {
            id: "s1".into(),
            display_name: "Survival".into(),
            loader: Loader::Paper,
            game_version: "1.20.1".into(),
            memory_mb: 4096,
            max_players: 20,
            external_port: 25565,
            additional_ports: vec![],
            image: "latest".into(),
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

    #[tokio::test]
    async fn base_env_reflects_loader_and_memory() {
        let spec = build(&server(), &HashMap::new(), &ControllerConfig::default()).await.unwrap();
        assert_eq!(spec.env.get("TYPE"), Some(&"PAPER".to_owned()));
        assert_eq!(spec.env.get("MEMORY"), Some(&"4096M".to_owned()));
        assert_eq!(spec.image, "itzg/minecraft-server:latest");
    }

    #[tokio::test]
    async fn extra_env_overrides_base_env_and_is_alias_substituted() {
        let mut server = server();
        server.overrides.extra_env.insert("MOTD".to_owned(), "{{server.display_name}}'s server".to_owned());
        let spec = build(&server, &HashMap::new(), &ControllerConfig::default()).await.unwrap();
        assert_eq!(spec.env.get("MOTD"), Some(&"Survival's server".to_owned()));
    }

    #[tokio::test]
    async fn data_dir_is_bind_mounted_at_data() {
        std::env::remove_var("CONTROL_PLANE_DATA_DIR");
        std::env::remove_var("HOST_DATA_PATH");
        let spec = build(&server(), &HashMap::new(), &ControllerConfig::default()).await.unwrap();
        assert!(spec.mounts.iter().any(|m| m.target == "/data" && m.source == "/data/servers/s1"));
    }
}
