//! Alias substitution: the textual template engine used uniformly for
//! module env values, volume paths, event-hook conditions, and built-in
//! template documents.

pub mod context;
pub mod template;

pub use context::Context;
pub use template::{substitute, MAX_DEPTH};
