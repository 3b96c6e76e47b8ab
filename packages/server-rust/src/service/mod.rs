//! Emulated services and the gateway pipeline in front of them.
//!
//! 1. **Domain services** (`domain`): in-memory sample services, one per wire style
//! 2. **Catalog** (`catalog`): explicit bootstrap of the service registry
//! 3. **Gateway** (`gateway`): `tower::Service` over the core resolve-and-dispatch path
//! 4. **Middleware** (`middleware`): Tower layers (metrics) around the gateway

pub mod catalog;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod middleware;

pub use catalog::{build_gateway, build_registry};
pub use config::ServerConfig;
pub use gateway::GatewayService;
pub use middleware::{build_gateway_pipeline, GatewayPipeline};
