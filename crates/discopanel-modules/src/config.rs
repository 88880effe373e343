/// Tunables for the Module Manager.
#[derive(Debug, Clone)]
pub struct ModuleManagerConfig {
    /// The control-plane network every module container is attached to,
    /// the same network Servers use (§4.7 Create-and-start, step 4).
    pub control_plane_network: String,
}

impl Default for ModuleManagerConfig {
    fn default() -> Self {
        Self {
            control_plane_network: "discopanel".to_owned(),
        }
    }
}
