//! The Runtime Adapter (§4.1): a uniform interface over a host container
//! runtime, plus the higher-level wrappers built once on top of it —
//! init-command wrapping, the label scheme, port-binding policy, and image
//! reference resolution — rather than duplicated across call sites.

pub mod adapter;
pub mod docker;
pub mod image;
pub mod init_script;
pub mod labels;
pub mod ports;
pub mod spec;

#[cfg(feature = "test-util")]
pub mod mock;

pub use adapter::{ContainerStats, InspectResult, LogFrameStream, RuntimeAdapter, RuntimeStatus};
pub use docker::DockerAdapter;
pub use spec::{BindMount, ContainerSpec, LogDriverConfig, PortBinding};
