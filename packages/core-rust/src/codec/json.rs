//! JSON-RPC codec: unwrapped JSON objects, operation named by the target header.

use http::StatusCode;
use serde_json::Value;

use super::{
    decode_json_object, json_error_response, DecodeInput, EncodeContext, EncodedResponse,
    ProtocolCodec,
};
use crate::error::ProtocolError;
use crate::protocol::{JsonVersion, ProtocolKind};

/// Codec for `application/x-amz-json-1.0` and `-1.1` services.
///
/// Both sub-versions share one structure; only the content type differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcCodec {
    version: JsonVersion,
}

impl JsonRpcCodec {
    #[must_use]
    pub fn new(version: JsonVersion) -> Self {
        Self { version }
    }

    #[must_use]
    pub fn version(&self) -> JsonVersion {
        self.version
    }
}

impl ProtocolCodec for JsonRpcCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::JsonRpc
    }

    fn decode_request(&self, input: &DecodeInput<'_>) -> Result<Value, ProtocolError> {
        decode_json_object(input.body).map(Value::Object)
    }

    fn encode_success(&self, _ctx: &EncodeContext<'_>, value: &Value) -> EncodedResponse {
        let body = match value {
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        EncodedResponse::new(StatusCode::OK, self.version.content_type(), body)
    }

    fn encode_error(&self, _ctx: &EncodeContext<'_>, error: &ProtocolError) -> EncodedResponse {
        json_error_response(self.version.content_type(), error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::QueryParams;

    fn ctx() -> EncodeContext<'static> {
        EncodeContext {
            operation: "GetItem",
            request_id: "req-1",
            success_status: StatusCode::CREATED,
        }
    }

    #[test]
    fn success_is_flat_json_with_status_200() {
        let codec = JsonRpcCodec::new(JsonVersion::V1_0);
        let resp = codec.encode_success(&ctx(), &json!({"TableNames": ["a"]}));
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body_text(), r#"{"TableNames":["a"]}"#);
        assert_eq!(resp.content_type(), Some("application/x-amz-json-1.0"));
    }

    #[test]
    fn null_success_encodes_empty_object() {
        let codec = JsonRpcCodec::default();
        let resp = codec.encode_success(&ctx(), &Value::Null);
        assert_eq!(resp.body_text(), "{}");
    }

    #[test]
    fn error_round_trip_matches_wire_shape() {
        let codec = JsonRpcCodec::new(JsonVersion::V1_0);
        let err = ProtocolError::new("ResourceNotFoundException", "x");
        let resp = codec.encode_error(&ctx(), &err);
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(
            body,
            json!({"__type": "ResourceNotFoundException", "message": "x"})
        );
    }

    #[test]
    fn version_1_1_differs_only_in_content_type() {
        let v10 = JsonRpcCodec::new(JsonVersion::V1_0);
        let v11 = JsonRpcCodec::new(JsonVersion::V1_1);
        let err = ProtocolError::validation("bad");
        let a = v10.encode_error(&ctx(), &err);
        let b = v11.encode_error(&ctx(), &err);
        assert_eq!(a.body, b.body);
        assert_eq!(a.status, b.status);
        assert_eq!(b.content_type(), Some("application/x-amz-json-1.1"));
    }

    #[test]
    fn decodes_object_body() {
        let codec = JsonRpcCodec::default();
        let query = QueryParams::new();
        let input = DecodeInput {
            body: br#"{"TableName":"users"}"#,
            content_type: Some("application/x-amz-json-1.0"),
            query: &query,
        };
        assert_eq!(
            codec.decode_request(&input).unwrap(),
            json!({"TableName": "users"})
        );
    }
}
