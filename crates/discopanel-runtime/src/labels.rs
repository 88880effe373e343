//! The label scheme stamped onto every container the control plane creates,
//! used both to mark ownership (for `ListOrphans`/`CleanupOrphans`) and to
//! carry the identifiers a Module or Server is reconciled against.

use std::collections::HashMap;

use discopanel_types::{Module, ModuleTemplate, Server};

/// Present on every container this control plane creates; its value is
/// unused, only presence is checked.
pub const OWNER_LABEL: &str = "discopanel.managed";
pub const SERVER_ID_LABEL: &str = "discopanel.server-id";
pub const SERVER_NAME_LABEL: &str = "discopanel.server.name";
pub const SERVER_LOADER_LABEL: &str = "discopanel.server.loader";
pub const SERVER_VERSION_LABEL: &str = "discopanel.server.version";
pub const MODULE_ID_LABEL: &str = "discopanel.module-id";
pub const MODULE_NAME_LABEL: &str = "discopanel.module.name";
pub const MODULE_TEMPLATE_ID_LABEL: &str = "discopanel.module.template-id";

/// Labels stamped on a Server's own container: the owner marker plus its
/// identity, display name, loader and game version (spec.md §6).
pub fn server_labels(server: &Server, extra: &HashMap<String, String>) -> HashMap<String, String> {
    let mut labels = extra.clone();
    labels.insert(OWNER_LABEL.to_owned(), "true".to_owned());
    labels.insert(SERVER_ID_LABEL.to_owned(), server.id.clone());
    labels.insert(SERVER_NAME_LABEL.to_owned(), server.display_name.clone());
    labels.insert(SERVER_LOADER_LABEL.to_owned(), server.loader.as_str().to_owned());
    labels.insert(SERVER_VERSION_LABEL.to_owned(), server.game_version.clone());
    labels
}

/// Labels stamped on a Module's container: everything `server_labels` sets
/// for the owning Server (the server id it already carries doubles for the
/// spec's `module.server_id`), plus the module's own id, its template's
/// name, and its template id.
pub fn module_labels(server: &Server, module: &Module, template: &ModuleTemplate, extra: &HashMap<String, String>) -> HashMap<String, String> {
    let mut labels = server_labels(server, extra);
    labels.insert(MODULE_ID_LABEL.to_owned(), module.id.clone());
    labels.insert(MODULE_NAME_LABEL.to_owned(), template.name.clone());
    labels.insert(MODULE_TEMPLATE_ID_LABEL.to_owned(), template.id.clone());
    labels
}

pub fn owner_filter() -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::new();
    filters.insert("label".to_owned(), vec![OWNER_LABEL.to_owned()]);
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_types::{Loader, PortMapping, PortProtocol, RuntimeOverrides, ServerStatus};

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

    fn template() -> ModuleTemplate {
        ModuleTemplate {
            id: "geyser".into(),
            name: "Geyser".into(),
            image: "geyser:latest".into(),
            default_env: HashMap::new(),
            default_volumes: vec![],
            default_ports: vec![],
            default_command: None,
            health_check_path: None,
            health_check_port: None,
            documentation: String::new(),
        }
    }

    fn module() -> Module {
        Module {
            id: "m1".into(),
            server_id: "s1".into(),
            template_id: "geyser".into(),
            status: ServerStatus::Stopped,
            container_id: String::new(),
            port_bindings: vec![PortMapping {
                name: "Bedrock".into(),
                host_port: 19132,
                container_port: 19132,
                protocol: PortProtocol::Udp,
                proxy_enabled: false,
            }],
            memory_mb: None,
            cpu_limit_cores: None,
            env_overrides: serde_json::Value::Null,
            volume_overrides: serde_json::Value::Null,
            dependencies: vec![],
            event_hooks: vec![],
            autostart: true,
            detached: false,
            health_check: Default::default(),
        }
    }

    #[test]
    fn server_labels_carry_identity_loader_and_version() {
        let labels = server_labels(&server(), &HashMap::new());
        assert_eq!(labels.get(OWNER_LABEL), Some(&"true".to_owned()));
        assert_eq!(labels.get(SERVER_ID_LABEL), Some(&"s1".to_owned()));
        assert_eq!(labels.get(SERVER_NAME_LABEL), Some(&"Survival".to_owned()));
        assert_eq!(labels.get(SERVER_LOADER_LABEL), Some(&"PAPER".to_owned()));
        assert_eq!(labels.get(SERVER_VERSION_LABEL), Some(&"1.20.1".to_owned()));
    }

    #[test]
    fn module_labels_carry_ids_and_template_name() {
        let labels = module_labels(&server(), &module(), &template(), &HashMap::new());
        assert_eq!(labels.get(SERVER_ID_LABEL), Some(&"s1".to_owned()));
        assert_eq!(labels.get(MODULE_ID_LABEL), Some(&"m1".to_owned()));
        assert_eq!(labels.get(MODULE_NAME_LABEL), Some(&"Geyser".to_owned()));
        assert_eq!(labels.get(MODULE_TEMPLATE_ID_LABEL), Some(&"geyser".to_owned()));
    }
}
