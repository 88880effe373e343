//! The Route Registry and Listener set: the shared state the TCP Proxy
//! consults on every accepted connection, and the Server Controller /
//! Module Manager publish into.

pub mod listeners;
pub mod registry;

pub use listeners::{ListenerEvent, ListenerSet};
pub use registry::RouteRegistry;
