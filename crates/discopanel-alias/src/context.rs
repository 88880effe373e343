use std::collections::HashMap;

use discopanel_types::{Module, Server};
use serde_json::{json, Value};

/// The four named roots alias substitution resolves `{{path.to.field}}`
/// tokens against: `server`, `module`, `config`, and an indexable `modules`
/// namespace keyed by template id.
#[derive(Debug, Clone, Default)]
pub struct Context {
    server: Value,
    module: Value,
    config: Value,
    modules: Value,
}

impl Context {
    pub fn new(server: &Server, config_values: &HashMap<String, String>) -> Self {
        Self {
            server: serde_json::to_value(server).unwrap_or(Value::Null),
            module: Value::Null,
            config: config_map_to_value(config_values),
            modules: Value::Object(Default::default()),
        }
    }

    /// Attaches the module a template is currently being rendered for, so
    /// `{{module.*}}` tokens resolve to it (see the create-and-start
    /// sequence in the Module Manager).
    pub fn with_current_module(mut self, module: &Module) -> Self {
        self.module = module_to_value(module);
        self
    }

    /// Populates the `modules` namespace, keyed by each module's template
    /// id, so a hook or env value on one module can reference another's
    /// resolved ports, e.g. `{{modules.geyser.ports.Bedrock.host_port}}`.
    pub fn with_sibling_modules(mut self, modules: &[Module]) -> Self {
        let mut map = serde_json::Map::new();
        for m in modules {
            map.insert(m.template_id.clone(), module_to_value(m));
        }
        self.modules = Value::Object(map);
        self
    }

    /// Walks a dot-separated path (first segment selects the root) and
    /// returns its value rendered as a display string, or `None` if the
    /// path doesn't resolve to a scalar.
    pub fn resolve(&self, path: &str) -> Option<String> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let mut cursor = match root {
            "server" => &self.server,
            "module" => &self.module,
            "config" => &self.config,
            "modules" => &self.modules,
            _ => return None,
        };
        for segment in segments {
            // `data_path` is the documented module-mount alias for the
            // Server's `data_dir` field (§6).
            let segment = if root == "server" && segment == "data_path" { "data_dir" } else { segment };
            cursor = cursor.get(segment)?;
        }
        scalar_to_string(cursor)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn config_map_to_value(values: &HashMap<String, String>) -> Value {
    let map = values.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
    Value::Object(map)
}

fn module_to_value(module: &Module) -> Value {
    let mut ports = serde_json::Map::new();
    for p in &module.port_bindings {
        ports.insert(
            p.name.clone(),
            json!({
                "host_port": p.host_port,
                "container_port": p.container_port,
                "protocol": p.protocol,
                "proxy_enabled": p.proxy_enabled,
            }),
        );
    }

    json!({
        "id": module.id,
        "server_id": module.server_id,
        "template_id": module.template_id,
        "status": module.status,
        "container_id": module.container_id,
        "memory_mb": module.memory_mb,
        "cpu_limit_cores": module.cpu_limit_cores,
        "autostart": module.autostart,
        "detached": module.detached,
        "ports": ports,
        "env": module.env_override_map(),
    })
}
