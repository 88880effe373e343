//! The Server Controller (§4.2): the per-Server state machine,
//! reconciliation loop, and the startup/shutdown sequences that bring the
//! rest of the core up and down around it. The top of the core — it drives
//! the Runtime Adapter, registers containers with the Log Streamer,
//! publishes Routes, feeds the Metrics Collector, and dispatches lifecycle
//! events to the Module Manager.

pub mod config;
pub mod controller;
pub mod spec_builder;
pub mod store;

pub use config::ControllerConfig;
pub use controller::{RecreateOutcome, ServerController};
pub use store::{InMemoryServerStore, ServerStore};
