//! Query codec: operation named by the `Action` parameter, XML responses.
//!
//! Request input is read from a JSON body. Form-encoded bodies and query
//! string parameters are also accepted as flat string parameters, so strict
//! Query clients work too; JSON remains the primary input format.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::StatusCode;
use serde_json::{Map, Value};

use super::xml::{escape, write_contents, write_text_element};
use super::{
    decode_json_object, is_form_encoded, DecodeInput, EncodeContext, EncodedResponse,
    ProtocolCodec,
};
use crate::error::ProtocolError;
use crate::params::QueryParams;
use crate::protocol::{ProtocolKind, ACTION_PARAM, VERSION_PARAM};

const CONTENT_TYPE_XML: &str = "text/xml";

/// Codec for Query-style services. Holds the per-service XML namespace and
/// list item element names.
#[derive(Debug, Clone)]
pub struct QueryCodec {
    namespace: Arc<str>,
    list_members: Arc<BTreeMap<String, String>>,
}

impl QueryCodec {
    #[must_use]
    pub fn new(namespace: &str, list_members: BTreeMap<String, String>) -> Self {
        Self {
            namespace: Arc::from(namespace),
            list_members: Arc::new(list_members),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Finds the `Action` value of a request.
    ///
    /// Looks at the query string first, then a form-encoded body, then a
    /// top-level `"Action"` string in a JSON body.
    #[must_use]
    pub fn extract_action(
        query: &QueryParams,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Option<String> {
        if let Some(action) = query.get(ACTION_PARAM).filter(|a| !a.is_empty()) {
            return Some(action.to_string());
        }
        if body.is_empty() {
            return None;
        }
        if is_form_encoded(content_type) {
            let text = std::str::from_utf8(body).ok()?;
            return QueryParams::parse(text)
                .get(ACTION_PARAM)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map
                .get(ACTION_PARAM)
                .and_then(Value::as_str)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

impl ProtocolCodec for QueryCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::QueryRpc
    }

    fn decode_request(&self, input: &DecodeInput<'_>) -> Result<Value, ProtocolError> {
        let mut params = Map::new();
        for (name, value) in input.query.iter() {
            params.insert(name.to_string(), Value::String(value.to_string()));
        }

        if is_form_encoded(input.content_type) {
            let text = std::str::from_utf8(input.body).map_err(|_| {
                ProtocolError::serialization("Form body is not valid UTF-8")
            })?;
            for (name, value) in QueryParams::parse(text).iter() {
                params.insert(name.to_string(), Value::String(value.to_string()));
            }
        } else {
            params.extend(decode_json_object(input.body)?);
        }

        params.remove(ACTION_PARAM);
        params.remove(VERSION_PARAM);
        Ok(Value::Object(params))
    }

    fn encode_success(&self, ctx: &EncodeContext<'_>, value: &Value) -> EncodedResponse {
        let op = ctx.operation;
        let mut xml = String::with_capacity(256);
        xml.push('<');
        xml.push_str(op);
        xml.push_str("Response xmlns=\"");
        xml.push_str(&escape(&self.namespace));
        xml.push_str("\"><");
        xml.push_str(op);
        xml.push_str("Result>");
        write_contents(&mut xml, value, &self.list_members);
        xml.push_str("</");
        xml.push_str(op);
        xml.push_str("Result><ResponseMetadata>");
        write_text_element(&mut xml, "RequestId", ctx.request_id);
        xml.push_str("</ResponseMetadata></");
        xml.push_str(op);
        xml.push_str("Response>");
        EncodedResponse::new(StatusCode::OK, CONTENT_TYPE_XML, xml)
    }

    fn encode_error(&self, ctx: &EncodeContext<'_>, error: &ProtocolError) -> EncodedResponse {
        let mut xml = String::with_capacity(192);
        xml.push_str("<ErrorResponse><Error>");
        write_text_element(&mut xml, "Code", &error.code);
        write_text_element(&mut xml, "Message", &error.message);
        xml.push_str("</Error>");
        write_text_element(&mut xml, "RequestId", ctx.request_id);
        xml.push_str("</ErrorResponse>");
        EncodedResponse::new(error.status(), CONTENT_TYPE_XML, xml)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
