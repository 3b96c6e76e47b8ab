//! Dispatcher: decode with the service codec, invoke the handler, encode.
//!
//! Every response leaving the dispatcher carries a fresh request identifier
//! and is encoded by the same codec that decoded the request. Failures that
//! are not deliberate [`ProtocolError`]s, panics included, are logged here and
//! reduced to a generic `InternalFailure`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::codec::{DecodeInput, EncodeContext, EncodedResponse, JsonRpcCodec, ProtocolCodec};
use crate::descriptor::{OperationInput, ServiceDescriptor};
use crate::error::{HandlerError, ProtocolError};
use crate::protocol::JsonVersion;
use crate::router::{NoMatch, ResolvedRequest};

/// Runs resolved requests and encodes router rejections.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Encodes errors for requests that never reached a service.
    fallback: JsonRpcCodec,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fallback: JsonRpcCodec::new(JsonVersion::V1_0),
        }
    }

    /// Decodes, invokes and encodes one resolved request. Never fails: every
    /// outcome is turned into a protocol-correct response.
    pub async fn dispatch(&self, request: ResolvedRequest) -> EncodedResponse {
        let request_id = new_request_id();
        let ResolvedRequest {
            service,
            operation,
            path_params,
            query,
            body,
            content_type,
            success_status,
            ..
        } = request;

        let codec = service.codec();
        let ctx = EncodeContext {
            operation: &operation,
            request_id: &request_id,
            success_status,
        };
        let decoded = codec.decode_request(&DecodeInput {
            body: &body,
            content_type: content_type.as_deref(),
            query: &query,
        });

        let response = match decoded {
            Ok(body) => {
                let input = OperationInput {
                    body,
                    path_params,
                    query,
                };
                match invoke(&service, &operation, input).await {
                    Ok(value) => codec.encode_success(&ctx, &value),
                    Err(err) => codec.encode_error(&ctx, &err),
                }
            }
            Err(err) => {
                debug!(
                    service = service.name(),
                    operation = %operation,
                    error = %err,
                    "request body rejected"
                );
                codec.encode_error(&ctx, &err)
            }
        };

        response
            .with_request_id(&request_id)
            .with_served_by(service.name(), &operation)
    }

    /// Encodes a router no-match as `InvalidAction`.
    #[must_use]
    pub fn reject(&self, no_match: &NoMatch) -> EncodedResponse {
        self.reject_with(&no_match.to_protocol_error())
    }

    /// Encodes an error for a request that never reached a service, using the
    /// JSON 1.0 error shape.
    #[must_use]
    pub fn reject_with(&self, error: &ProtocolError) -> EncodedResponse {
        let request_id = new_request_id();
        let ctx = EncodeContext {
            operation: "",
            request_id: &request_id,
            success_status: http::StatusCode::OK,
        };
        self.fallback
            .encode_error(&ctx, error)
            .with_request_id(&request_id)
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Calls the service handler and reduces every failure to a [`ProtocolError`].
async fn invoke(
    service: &ServiceDescriptor,
    operation: &str,
    input: OperationInput,
) -> Result<Value, ProtocolError> {
    let call = AssertUnwindSafe(service.handler().dispatch(operation, input))
        .catch_unwind()
        .await;
    match call {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(HandlerError::Protocol(err))) => {
            debug!(
                service = service.name(),
                operation,
                code = %err.code,
                "operation returned an error"
            );
            Err(err)
        }
        Ok(Err(HandlerError::Internal(err))) => {
            error!(
                service = service.name(),
                operation,
                error = %format_args!("{err:#}"),
                "handler failed"
            );
            Err(ProtocolError::internal())
        }
        Err(payload) => {
            error!(
                service = service.name(),
                operation,
                panic = panic_message(payload.as_ref()),
                "handler panicked"
            );
            Err(ProtocolError::internal())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
