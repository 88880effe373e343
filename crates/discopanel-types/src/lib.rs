//! Shared data model and error kinds consumed by every crate in the
//! DiscoPanel control-plane core.

pub mod error;
pub mod log;
pub mod module;
pub mod route;
pub mod server;
pub mod slp;

pub use error::{Error, Result};
pub use log::{LogEntry, LogStream};
pub use module::{EventHook, HealthCheckSpec, HookAction, Module, ModuleDependency, ModuleEvent, ModuleTemplate};
pub use route::{BackendEndpoint, Listener, Route};
pub use server::{
    ConfigValueType, Loader, MountOverride, PortMapping, PortProtocol, RuntimeOverrides, Server,
    ServerConfig, ServerConfigField, ServerStatus, GLOBAL_DEFAULTS_ID,
};
pub use slp::SlpResult;
