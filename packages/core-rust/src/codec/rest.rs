//! REST codec: plain JSON in and out, outcome carried by the HTTP status.

use serde_json::Value;

use super::{
    decode_json_object, json_error_response, DecodeInput, EncodeContext, EncodedResponse,
    ProtocolCodec,
};
use crate::error::ProtocolError;
use crate::protocol::ProtocolKind;

const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, Default)]
pub struct RestCodec;

impl ProtocolCodec for RestCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rest
    }

    fn decode_request(&self, input: &DecodeInput<'_>) -> Result<Value, ProtocolError> {
        decode_json_object(input.body).map(Value::Object)
    }

    fn encode_success(&self, ctx: &EncodeContext<'_>, value: &Value) -> EncodedResponse {
        let body = match value {
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        EncodedResponse::new(ctx.success_status, CONTENT_TYPE_JSON, body)
    }

    fn encode_error(&self, _ctx: &EncodeContext<'_>, error: &ProtocolError) -> EncodedResponse {
        json_error_response(CONTENT_TYPE_JSON, error)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_uses_route_status() {
        let ctx = EncodeContext {
            operation: "CreateThing",
            request_id: "r",
            success_status: StatusCode::CREATED,
        };
        let resp = RestCodec.encode_success(&ctx, &json!({"Id": "1"}));
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(resp.body_text(), r#"{"Id":"1"}"#);
    }

    #[test]
    fn error_uses_shared_json_shape() {
        let ctx = EncodeContext {
            operation: "GetThing",
            request_id: "r",
            success_status: StatusCode::OK,
        };
        let resp = RestCodec.encode_error(&ctx, &ProtocolError::new("AlreadyExistsException", "dup"));
        assert_eq!(resp.status, StatusCode::CONFLICT);
        assert_eq!(
            resp.body_text(),
            r#"{"__type":"AlreadyExistsException","message":"dup"}"#
        );
    }
}
