//! HTTP handler definitions for the emulator listener.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod admin;
pub mod gateway;
pub mod health;

pub use admin::reset_handler;
pub use gateway::gateway_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use cumulus_core::Gateway;

use super::{NetworkConfig, ShutdownController};
use crate::service::GatewayPipeline;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Gateway service wrapped in its middleware; cloned per request.
    pub pipeline: GatewayPipeline,
    /// The gateway itself, for registry access and early rejections.
    pub gateway: Arc<Gateway>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, TLS, limits).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        gateway: Arc<Gateway>,
        shutdown: Arc<ShutdownController>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            pipeline: crate::service::build_gateway_pipeline(Arc::clone(&gateway)),
            gateway,
            shutdown,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use cumulus_core::{
        ActionTable, JsonRpcSpec, JsonVersion, Registry, ServiceDescriptor, ServiceState,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::service::{build_gateway, ServerConfig};

    /// Target prefix of the service built by [`slow_gateway`].
    pub(crate) const SLOW_TARGET_PREFIX: &str = "Sleepy_20240101";

    pub(crate) fn test_state() -> AppState {
        let gateway = build_gateway(&ServerConfig::default()).unwrap();
        AppState::new(
            gateway,
            Arc::new(ShutdownController::new()),
            NetworkConfig::default(),
        )
    }

    struct Sleepy {
        delay: Duration,
    }

    impl ServiceState for Sleepy {}

    /// Gateway with one JSON 1.0 service whose `Nap` action takes `delay`.
    pub(crate) fn slow_gateway(delay: Duration) -> Arc<Gateway> {
        let table = ActionTable::new(Arc::new(Sleepy { delay })).action(
            "Nap",
            |state: Arc<Sleepy>, _input| async move {
                tokio::time::sleep(state.delay).await;
                Ok::<Value, cumulus_core::HandlerError>(json!({ "Rested": true }))
            },
        );
        let descriptor = ServiceDescriptor::new(
            "sleepy",
            JsonRpcSpec::new(SLOW_TARGET_PREFIX, JsonVersion::V1_0),
            table.into_handler(),
        );
        let registry = Registry::from_descriptors([descriptor]).unwrap();
        Arc::new(Gateway::new(Arc::new(registry)))
    }
}
