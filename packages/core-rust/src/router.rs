//! Request resolution: which service and which operation a request targets.
//!
//! Strategies are tried in a fixed order: REST `(method, path)`, then the
//! `X-Amz-Target` header, then the Query `Action` parameter. The router is a
//! pure function of the request and the immutable [`Registry`].

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tracing::{debug, warn};

use crate::codec::QueryCodec;
use crate::descriptor::ServiceDescriptor;
use crate::error::{codes, ProtocolError};
use crate::params::{PathParams, QueryParams};
use crate::protocol::{ProtocolKind, TARGET_HEADER};
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// InboundRequest
// ---------------------------------------------------------------------------

/// Transport-neutral view of one HTTP request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Parses a raw query string (without the leading `?`).
    #[must_use]
    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = QueryParams::parse(raw);
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    fn target(&self) -> Option<&str> {
        self.headers
            .get(TARGET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    }
}

// ---------------------------------------------------------------------------
// Resolution outcome
// ---------------------------------------------------------------------------

/// The strategy that claimed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Rest,
    Target,
    Action,
}

/// A request bound to a service and an operation name.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub service: Arc<ServiceDescriptor>,
    pub operation: String,
    pub path_params: PathParams,
    pub query: QueryParams,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub matched_by: MatchKind,
    /// Success status of the matched REST route; `200 OK` otherwise.
    pub success_status: StatusCode,
}

impl ResolvedRequest {
    #[must_use]
    pub fn protocol_kind(&self) -> ProtocolKind {
        self.service.protocol_kind()
    }
}

impl PartialEq for ResolvedRequest {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.service, &other.service)
            && self.operation == other.operation
            && self.path_params == other.path_params
            && self.query == other.query
            && self.body == other.body
            && self.content_type == other.content_type
            && self.matched_by == other.matched_by
            && self.success_status == other.success_status
    }
}

/// Why no service claimed a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoMatch {
    #[error("no service is registered for target '{target}'")]
    UnknownTarget { target: String },
    #[error("no service is registered for action '{action}'")]
    UnknownAction { action: String },
    #[error("no service recognizes {method} {path}")]
    Unrecognized { method: String, path: String },
}

impl NoMatch {
    /// The client-facing error for this outcome. Always `InvalidAction`.
    #[must_use]
    pub fn to_protocol_error(&self) -> ProtocolError {
        let message = match self {
            Self::UnknownTarget { target } => {
                format!("The target {target} is not valid for this endpoint")
            }
            Self::UnknownAction { action } => {
                format!("The action {action} is not valid for this endpoint")
            }
            Self::Unrecognized { method, path } => {
                format!("Could not determine the service for {method} {path}")
            }
        };
        ProtocolError::new(codes::INVALID_ACTION, message)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Resolves inbound requests against a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolves a request to a service and operation.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatch`] when no strategy claims the request. A registered
    /// JSON-RPC target prefix always resolves, even when the operation after
    /// the `.` is unknown to the service.
    pub fn resolve(&self, request: &InboundRequest) -> Result<ResolvedRequest, NoMatch> {
        if let Some(hit) = self.registry.lookup_by_path(&request.method, &request.path) {
            debug!(
                service = hit.service.name(),
                operation = %hit.operation,
                "resolved by REST route"
            );
            return Ok(resolved(
                request,
                hit.service,
                hit.operation,
                hit.path_params,
                MatchKind::Rest,
                hit.success_status,
            ));
        }

        let target = request.target();
        if let Some((prefix, operation)) = target.and_then(split_target) {
            if let Some(service) = self.registry.lookup_by_target_prefix(prefix) {
                debug!(service = service.name(), operation, "resolved by target header");
                return Ok(resolved(
                    request,
                    Arc::clone(service),
                    operation.to_string(),
                    PathParams::new(),
                    MatchKind::Target,
                    StatusCode::OK,
                ));
            }
        }

        let action =
            QueryCodec::extract_action(&request.query, request.content_type(), &request.body);
        if let Some(action) = action.as_deref() {
            if let Some(service) = self.registry.lookup_by_action(action) {
                debug!(service = service.name(), operation = action, "resolved by action");
                return Ok(resolved(
                    request,
                    Arc::clone(service),
                    action.to_string(),
                    PathParams::new(),
                    MatchKind::Action,
                    StatusCode::OK,
                ));
            }
        }

        let outcome = if let Some(target) = target {
            NoMatch::UnknownTarget {
                target: target.to_string(),
            }
        } else if let Some(action) = action {
            NoMatch::UnknownAction { action }
        } else {
            NoMatch::Unrecognized {
                method: request.method.to_string(),
                path: request.path.clone(),
            }
        };
        warn!(reason = %outcome, "request not routed");
        Err(outcome)
    }
}

fn resolved(
    request: &InboundRequest,
    service: Arc<ServiceDescriptor>,
    operation: String,
    path_params: PathParams,
    matched_by: MatchKind,
    success_status: StatusCode,
) -> ResolvedRequest {
    ResolvedRequest {
        service,
        operation,
        path_params,
        query: request.query.clone(),
        body: request.body.clone(),
        content_type: request.content_type().map(str::to_string),
        matched_by,
        success_status,
    }
}

/// Splits `<prefix>.<operation>` on the last `.`; both halves must be non-empty.
fn split_target(target: &str) -> Option<(&str, &str)> {
    let (prefix, operation) = target.rsplit_once('.')?;
    if prefix.is_empty() || operation.is_empty() {
        None
    } else {
        Some((prefix, operation))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
