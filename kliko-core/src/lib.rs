//! Core types, caching, and service wiring for the kliko waste pickup aggregator.

/// Cache trait plus in-process and Redis backends.
pub mod cache;
/// Calendar feed generation from pickup events.
pub mod calendar;
/// Domain models shared by all providers.
pub mod model;
/// Traits describing the provider interfaces.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;

pub use cache::*;
pub use calendar::*;
pub use model::*;
pub use ports::*;
pub use service::*;
