//! Tower middleware layers for the gateway pipeline.
//!
//! - [`metrics`]: Request timing and counting via `tracing` spans and the `metrics` facade
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;

pub use metrics::MetricsLayer;
pub use pipeline::{build_gateway_pipeline, GatewayPipeline};
