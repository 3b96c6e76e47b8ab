//! Wire codecs: one per protocol style, all sharing the [`ProtocolCodec`] contract.
//!
//! Codecs are stateless; each call is a pure function of its input. The
//! dispatcher always encodes a response with the codec that decoded its
//! request, so request and response protocol stay symmetric.
//!
//! - [`json`]: JSON-RPC style (`X-Amz-Target`, `application/x-amz-json-1.x`)
//! - [`query`]: Query style (`Action` parameter, XML responses)
//! - [`rest`]: REST style (verb + path, plain JSON)

pub mod json;
pub mod query;
pub mod rest;
pub mod xml;

pub use json::JsonRpcCodec;
pub use query::QueryCodec;
pub use rest::RestCodec;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::params::QueryParams;
use crate::protocol::{ProtocolKind, ERROR_TYPE_HEADER, REQUEST_ID_HEADER};

// ---------------------------------------------------------------------------
// Codec inputs and outputs
// ---------------------------------------------------------------------------

/// Raw request material handed to [`ProtocolCodec::decode_request`].
#[derive(Debug, Clone, Copy)]
pub struct DecodeInput<'a> {
    pub body: &'a [u8],
    pub content_type: Option<&'a str>,
    pub query: &'a QueryParams,
}

/// Per-call facts a codec needs to build an envelope.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    /// Resolved operation name; Query envelopes are named after it.
    pub operation: &'a str,
    /// Identifier stamped on the response.
    pub request_id: &'a str,
    /// Status for a successful call. Only REST routes vary it.
    pub success_status: StatusCode,
}

/// Identifies which service operation produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedBy {
    pub service: String,
    pub operation: String,
}

/// A fully encoded response: status, transport headers and body bytes.
#[derive(Debug, Clone)]
pub struct EncodedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when the request resolved to a service; `None` for router rejects.
    pub served_by: Option<ServedBy>,
}

impl EncodedResponse {
    #[must_use]
    pub fn new(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            headers,
            body: body.into(),
            served_by: None,
        }
    }

    /// Stamps the request identifier header.
    #[must_use]
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(request_id) {
            self.headers.insert(REQUEST_ID_HEADER, value);
        }
        self
    }

    #[must_use]
    pub fn with_served_by(mut self, service: &str, operation: &str) -> Self {
        self.served_by = Some(ServedBy {
            service: service.to_string(),
            operation: operation.to_string(),
        });
        self
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Body as UTF-8 text, lossy. Mostly useful in tests and logs.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// ProtocolCodec
// ---------------------------------------------------------------------------

/// Encoding and decoding strategy for one wire protocol.
pub trait ProtocolCodec: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    /// Decodes request material into the structured operation input.
    ///
    /// # Errors
    ///
    /// Returns a `SerializationException` [`ProtocolError`] when the body is
    /// not valid for this protocol.
    fn decode_request(&self, input: &DecodeInput<'_>) -> Result<Value, ProtocolError>;

    fn encode_success(&self, ctx: &EncodeContext<'_>, value: &Value) -> EncodedResponse;

    fn encode_error(&self, ctx: &EncodeContext<'_>, error: &ProtocolError) -> EncodedResponse;
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Decodes a JSON object body; an empty or whitespace-only body is `{}`.
pub(crate) fn decode_json_object(body: &[u8]) -> Result<Map<String, Value>, ProtocolError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProtocolError::serialization(
            "Request body must be a JSON object",
        )),
        Err(err) => Err(ProtocolError::serialization(format!(
            "Request body is not valid JSON: {err}"
        ))),
    }
}

/// Builds the `{"__type": code, "message": message}` error body shared by the
/// JSON-RPC and REST codecs.
pub(crate) fn json_error_response(
    content_type: &'static str,
    error: &ProtocolError,
) -> EncodedResponse {
    let body = serde_json::json!({
        "__type": error.code,
        "message": error.message,
    });
    let mut response = EncodedResponse::new(error.status(), content_type, body.to_string());
    if let Ok(value) = HeaderValue::from_str(&error.code) {
        response.headers.insert(ERROR_TYPE_HEADER, value);
    }
    response
}

/// Whether a content type denotes a form-encoded body.
pub(crate) fn is_form_encoded(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.trim_start()
            .to_ascii_lowercase()
            .starts_with("application/x-www-form-urlencoded")
    })
}
