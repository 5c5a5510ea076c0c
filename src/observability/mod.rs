//! Observability infrastructure
//!
//! Structured logging configuration for the router. Metrics and health
//! surfaces are intentionally out of scope.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
