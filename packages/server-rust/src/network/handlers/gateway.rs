//! Catch-all handler feeding every non-internal request to the gateway.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use cumulus_core::error::codes;
use cumulus_core::{EncodedResponse, InboundRequest, ProtocolError};
use tower::ServiceExt;
use tracing::warn;

use super::AppState;

/// Reads the request (body capped at `max_body_bytes`), runs it through the
/// gateway pipeline and writes the encoded response.
///
/// The whole exchange is bounded by `request_timeout`; an expired request is
/// answered with an encoded `ServiceUnavailable` error.
pub async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response {
    let _guard = state.shutdown.in_flight_guard();
    let path = request.uri().path().to_string();
    let timeout = state.config.request_timeout;

    let encoded = match tokio::time::timeout(timeout, run_gateway(&state, request)).await {
        Ok(encoded) => encoded,
        Err(_) => {
            warn!(path = %path, timeout = ?timeout, "gateway request timed out");
            let error = ProtocolError::new(
                codes::SERVICE_UNAVAILABLE,
                format!("Request did not complete within {}ms", timeout.as_millis()),
            );
            state.gateway.dispatcher().reject_with(&error)
        }
    };
    into_http(encoded)
}

async fn run_gateway(state: &AppState, request: Request) -> EncodedResponse {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %parts.uri.path(), error = %err, "request body rejected");
            let error = ProtocolError::serialization(format!(
                "Request body could not be read (limit {} bytes)",
                state.config.max_body_bytes
            ));
            return state.gateway.dispatcher().reject_with(&error);
        }
    };

    let mut inbound = InboundRequest::new(parts.method, parts.uri.path());
    if let Some(query) = parts.uri.query() {
        inbound = inbound.with_query(query);
    }
    inbound.headers = parts.headers;
    inbound.body = body;

    match state.pipeline.clone().oneshot(inbound).await {
        Ok(encoded) => encoded,
        Err(never) => match never {},
    }
}

fn into_http(encoded: EncodedResponse) -> Response {
    let mut response = Response::new(Body::from(encoded.body));
    *response.status_mut() = encoded.status;
    *response.headers_mut() = encoded.headers;
    response
}
