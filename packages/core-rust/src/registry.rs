use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};

use crate::descriptor::{ProtocolSpec, ServiceDescriptor};
use crate::params::PathParams;
use crate::route::{PatternError, RoutePattern};

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Configuration errors detected while registering services.
///
/// All of these surface at process start; none can occur per request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service name must not be empty")]
    EmptyName,
    #[error("service '{name}' is already registered")]
    DuplicateName { name: String },
    #[error("REST service '{service}' must declare a path prefix")]
    MissingPathPrefix { service: String },
    #[error("REST service '{service}' declares no routes")]
    NoRoutes { service: String },
    #[error("invalid route for service '{service}': {source}")]
    InvalidRoute {
        service: String,
        #[source]
        source: PatternError,
    },
    #[error("route {method} {pattern} of '{service}' is indistinguishable from one of '{existing}'")]
    DuplicateRoute {
        method: String,
        pattern: String,
        service: String,
        existing: String,
    },
    #[error("JSON-RPC service '{service}' has an invalid target prefix '{prefix}'")]
    InvalidTargetPrefix { service: String, prefix: String },
    #[error("target prefix '{prefix}' of '{service}' is already claimed by '{existing}'")]
    DuplicateTargetPrefix {
        prefix: String,
        service: String,
        existing: String,
    },
    #[error("Query service '{service}' declares no actions")]
    NoActions { service: String },
    #[error("action '{action}' of '{service}' is already claimed by '{existing}'")]
    DuplicateAction {
        action: String,
        service: String,
        existing: String,
    },
}

// ---------------------------------------------------------------------------
// Route table entries
// ---------------------------------------------------------------------------

/// A REST route compiled at registration time.
#[derive(Debug)]
struct CompiledRoute {
    service: usize,
    method: Method,
    pattern: RoutePattern,
    operation: String,
    success_status: StatusCode,
}

/// Result of a successful REST lookup.
#[derive(Debug, Clone)]
pub struct RestMatch {
    pub service: Arc<ServiceDescriptor>,
    pub operation: String,
    pub path_params: PathParams,
    pub success_status: StatusCode,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable table of every registered service.
///
/// Built once through [`RegistryBuilder`] before the listener starts, then
/// shared by `Arc` and only read. Provides four lookups:
/// - **By name**: the service's unique short identifier
/// - **By path**: REST `(method, path)` against compiled route patterns
/// - **By target prefix**: JSON-RPC `X-Amz-Target` prefix
/// - **By action**: Query `Action` name
///
/// Every lookup returns `None` when nothing claims the request.
#[derive(Debug, Default)]
pub struct Registry {
    services: Vec<Arc<ServiceDescriptor>>,
    by_name: HashMap<String, usize>,
    by_target: HashMap<String, usize>,
    by_action: HashMap<String, usize>,
    routes: Vec<CompiledRoute>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registers every descriptor in order and freezes the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] encountered.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        let mut builder = Self::builder();
        for descriptor in descriptors {
            builder.register(descriptor)?;
        }
        Ok(builder.build())
    }

    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.by_name.get(name).map(|&idx| &self.services[idx])
    }

    /// Matches `(method, path)` against REST routes in registration order.
    #[must_use]
    pub fn lookup_by_path(&self, method: &Method, path: &str) -> Option<RestMatch> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|path_params| RestMatch {
                    service: Arc::clone(&self.services[route.service]),
                    operation: route.operation.clone(),
                    path_params,
                    success_status: route.success_status,
                })
            })
    }

    #[must_use]
    pub fn lookup_by_target_prefix(&self, prefix: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.by_target.get(prefix).map(|&idx| &self.services[idx])
    }

    #[must_use]
    pub fn lookup_by_action(&self, action: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.by_action.get(action).map(|&idx| &self.services[idx])
    }

    /// All services in registration order.
    pub fn services(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.services.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Accumulates descriptors, validating each one before it is admitted.
///
/// A rejected descriptor leaves the builder unchanged.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Registers a service.
    ///
    /// # Errors
    ///
    /// Fails when the name, a JSON-RPC target prefix, a Query action or a REST
    /// route collides with an already registered service, or when the
    /// protocol metadata is incomplete.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> Result<&mut Self, RegistryError> {
        let reg = &self.registry;
        let name = descriptor.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if reg.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }

        let idx = reg.services.len();
        let mut routes = Vec::new();

        match descriptor.protocol() {
            ProtocolSpec::Rest(spec) => {
                if spec.path_prefix.trim_matches('/').is_empty() {
                    return Err(RegistryError::MissingPathPrefix { service: name });
                }
                if spec.routes.is_empty() {
                    return Err(RegistryError::NoRoutes { service: name });
                }
                for route in &spec.routes {
                    let pattern = RoutePattern::parse(&spec.full_path(route)).map_err(
                        |source| RegistryError::InvalidRoute {
                            service: name.clone(),
                            source,
                        },
                    )?;
                    let clash = reg
                        .routes
                        .iter()
                        .chain(routes.iter())
                        .find(|existing: &&CompiledRoute| {
                            existing.method == route.method
                                && existing.pattern.same_shape(&pattern)
                        });
                    if let Some(existing) = clash {
                        let existing = if existing.service == idx {
                            name.clone()
                        } else {
                            reg.services[existing.service].name().to_string()
                        };
                        return Err(RegistryError::DuplicateRoute {
                            method: route.method.to_string(),
                            pattern: pattern.to_string(),
                            service: name,
                            existing,
                        });
                    }
                    routes.push(CompiledRoute {
                        service: idx,
                        method: route.method.clone(),
                        pattern,
                        operation: route.operation.clone(),
                        success_status: route.success_status,
                    });
                }
            }
            ProtocolSpec::JsonRpc(spec) => {
                let prefix = &spec.target_prefix;
                if prefix.is_empty() || prefix.contains('.') {
                    return Err(RegistryError::InvalidTargetPrefix {
                        service: name,
                        prefix: prefix.clone(),
                    });
                }
                if let Some(&other) = reg.by_target.get(prefix) {
                    return Err(RegistryError::DuplicateTargetPrefix {
                        prefix: prefix.clone(),
                        service: name,
                        existing: reg.services[other].name().to_string(),
                    });
                }
            }
            ProtocolSpec::QueryRpc(spec) => {
                if spec.action_names.is_empty() {
                    return Err(RegistryError::NoActions { service: name });
                }
                for action in &spec.action_names {
                    if let Some(&other) = reg.by_action.get(action) {
                        return Err(RegistryError::DuplicateAction {
                            action: action.clone(),
                            service: name,
                            existing: reg.services[other].name().to_string(),
                        });
                    }
                }
            }
        }

        // Validation passed: admit the descriptor and its index entries.
        let reg = &mut self.registry;
        match descriptor.protocol() {
            ProtocolSpec::Rest(_) => reg.routes.extend(routes),
            ProtocolSpec::JsonRpc(spec) => {
                reg.by_target.insert(spec.target_prefix.clone(), idx);
            }
            ProtocolSpec::QueryRpc(spec) => {
                for action in &spec.action_names {
                    reg.by_action.insert(action.clone(), idx);
                }
            }
        }
        reg.by_name.insert(name, idx);
        reg.services.push(Arc::new(descriptor));
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
