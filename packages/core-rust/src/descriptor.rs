//! Service descriptors: the static metadata each emulated service publishes,
//! plus its opaque dispatch capability.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::Value;

use crate::codec::{JsonRpcCodec, ProtocolCodec, QueryCodec, RestCodec};
use crate::error::HandlerError;
use crate::params::{PathParams, QueryParams};
use crate::protocol::{JsonVersion, ProtocolKind};

// ---------------------------------------------------------------------------
// Dispatch capability
// ---------------------------------------------------------------------------

/// Decoded input handed to a service for one operation call.
#[derive(Debug, Clone, Default)]
pub struct OperationInput {
    /// Protocol-decoded body; always a JSON object for the built-in codecs.
    pub body: Value,
    /// REST `{name}` captures. Empty for JSON-RPC and Query calls.
    pub path_params: PathParams,
    pub query: QueryParams,
}

/// The `operation → handler` capability a service exposes to the dispatcher.
///
/// The router never introspects it; it only names the operation to run.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    /// Runs `operation`. Unknown operations must be reported as a
    /// `ProtocolError`, not a panic.
    async fn dispatch(&self, operation: &str, input: OperationInput)
        -> Result<Value, HandlerError>;

    /// Drops all service state, returning it to a freshly started condition.
    async fn reset(&self) {}
}

// ---------------------------------------------------------------------------
// Protocol-specific metadata
// ---------------------------------------------------------------------------

/// One REST route, relative to the service's path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRoute {
    pub method: Method,
    pub path: String,
    pub operation: String,
    pub success_status: StatusCode,
}

impl RestRoute {
    pub fn new(method: Method, path: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            operation: operation.into(),
            success_status: StatusCode::OK,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }
}

/// REST metadata: a path prefix and the routes mounted beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestSpec {
    pub path_prefix: String,
    pub routes: Vec<RestRoute>,
}

impl RestSpec {
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn route(mut self, method: Method, path: &str, operation: &str) -> Self {
        self.routes.push(RestRoute::new(method, path, operation));
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: RestRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Absolute pattern for a route: the prefix joined with the route path.
    #[must_use]
    pub fn full_path(&self, route: &RestRoute) -> String {
        let prefix = self.path_prefix.trim_end_matches('/');
        if route.path == "/" && !prefix.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}{}", route.path)
        }
    }
}

/// JSON-RPC metadata: the target header prefix and the JSON sub-version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcSpec {
    pub target_prefix: String,
    pub version: JsonVersion,
}

impl JsonRpcSpec {
    pub fn new(target_prefix: impl Into<String>, version: JsonVersion) -> Self {
        Self {
            target_prefix: target_prefix.into(),
            version,
        }
    }
}

/// Query metadata: the closed action set and XML rendering details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRpcSpec {
    pub namespace: String,
    pub action_names: BTreeSet<String>,
    /// List field name → XML item element name. Unlisted lists use `member`.
    pub list_members: BTreeMap<String, String>,
}

impl QueryRpcSpec {
    pub fn new<I, S>(namespace: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            action_names: actions.into_iter().map(Into::into).collect(),
            list_members: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_list_member(mut self, list: &str, member: &str) -> Self {
        self.list_members
            .insert(list.to_string(), member.to_string());
        self
    }
}

/// Protocol kind of a service together with its kind-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolSpec {
    Rest(RestSpec),
    JsonRpc(JsonRpcSpec),
    QueryRpc(QueryRpcSpec),
}

impl ProtocolSpec {
    #[must_use]
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Self::Rest(_) => ProtocolKind::Rest,
            Self::JsonRpc(_) => ProtocolKind::JsonRpc,
            Self::QueryRpc(_) => ProtocolKind::QueryRpc,
        }
    }

    fn codec(&self) -> Arc<dyn ProtocolCodec> {
        match self {
            Self::Rest(_) => Arc::new(RestCodec),
            Self::JsonRpc(spec) => Arc::new(JsonRpcCodec::new(spec.version)),
            Self::QueryRpc(spec) => {
                Arc::new(QueryCodec::new(&spec.namespace, spec.list_members.clone()))
            }
        }
    }
}

impl From<RestSpec> for ProtocolSpec {
    fn from(spec: RestSpec) -> Self {
        Self::Rest(spec)
    }
}

impl From<JsonRpcSpec> for ProtocolSpec {
    fn from(spec: JsonRpcSpec) -> Self {
        Self::JsonRpc(spec)
    }
}

impl From<QueryRpcSpec> for ProtocolSpec {
    fn from(spec: QueryRpcSpec) -> Self {
        Self::QueryRpc(spec)
    }
}

// ---------------------------------------------------------------------------
// ServiceDescriptor
// ---------------------------------------------------------------------------

/// Everything the registry and router know about one emulated service.
///
/// Immutable once built. The codec is derived from the protocol metadata at
/// construction so every request for this service reuses it.
pub struct ServiceDescriptor {
    name: String,
    protocol: ProtocolSpec,
    codec: Arc<dyn ProtocolCodec>,
    handler: Arc<dyn ServiceHandler>,
}

impl ServiceDescriptor {
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<ProtocolSpec>,
        handler: Arc<dyn ServiceHandler>,
    ) -> Self {
        let protocol = protocol.into();
        Self {
            name: name.into(),
            codec: protocol.codec(),
            protocol,
            handler,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL prefix of the REST routes; empty for non-REST services.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        match &self.protocol {
            ProtocolSpec::Rest(spec) => &spec.path_prefix,
            _ => "",
        }
    }

    #[must_use]
    pub fn protocol_kind(&self) -> ProtocolKind {
        self.protocol.kind()
    }

    #[must_use]
    pub fn target_prefix(&self) -> Option<&str> {
        match &self.protocol {
            ProtocolSpec::JsonRpc(spec) => Some(&spec.target_prefix),
            _ => None,
        }
    }

    #[must_use]
    pub fn action_names(&self) -> Option<&BTreeSet<String>> {
        match &self.protocol {
            ProtocolSpec::QueryRpc(spec) => Some(&spec.action_names),
            _ => None,
        }
    }

    #[must_use]
    pub fn protocol(&self) -> &ProtocolSpec {
        &self.protocol
    }

    #[must_use]
    pub fn codec(&self) -> &dyn ProtocolCodec {
        self.codec.as_ref()
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ServiceHandler> {
        &self.handler
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
