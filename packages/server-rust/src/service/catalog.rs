//! Explicit service bootstrap.
//!
//! The registry is assembled from a fixed list of descriptor constructors and
//! frozen before any listener binds.

use std::sync::Arc;

use cumulus_core::{Gateway, Registry, RegistryError, ServiceDescriptor};
use tracing::info;

use super::config::ServerConfig;
use super::domain::{dynamodb, rds, secretsmanager, ses};

type DescriptorFn = fn(&ServerConfig) -> ServiceDescriptor;

/// Every built-in service, in registration order.
const SERVICES: &[DescriptorFn] = &[
    ses::descriptor,
    dynamodb::descriptor,
    secretsmanager::descriptor,
    rds::descriptor,
];

/// Builds the registry of all built-in services.
///
/// # Errors
///
/// Returns the first [`RegistryError`] raised while registering, such as a
/// duplicate name, target prefix, action or REST route.
pub fn build_registry(config: &ServerConfig) -> Result<Registry, RegistryError> {
    let mut builder = Registry::builder();
    for constructor in SERVICES {
        let descriptor = constructor(config);
        info!(
            service = descriptor.name(),
            protocol = descriptor.protocol_kind().as_str(),
            "registering service"
        );
        builder.register(descriptor)?;
    }
    Ok(builder.build())
}

/// Builds the registry and wraps it in a [`Gateway`].
///
/// # Errors
///
/// See [`build_registry`].
pub fn build_gateway(config: &ServerConfig) -> Result<Arc<Gateway>, RegistryError> {
    let registry = build_registry(config)?;
    Ok(Arc::new(Gateway::new(Arc::new(registry))))
}
