//! HTTP API Module
//!
//! Serves signed peer seeds to bootstrapping nodes, plus diagnostics over
//! the crawler and monitoring endpoints.

mod encoder;
mod error;
mod metrics;
mod query;
mod routes;
mod selector;

#[cfg(test)]
mod testing;

pub use encoder::SeedEncoder;
pub use metrics::Metrics;
pub use routes::{run_api_server, ApiState};
