//! Wire protocol identifiers and the well-known transport header names.

use serde::{Deserialize, Serialize};

/// Header carrying `<targetPrefix>.<operation>` for JSON-RPC style services.
pub const TARGET_HEADER: &str = "x-amz-target";
/// Header stamped on every response with a fresh request identifier.
pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";
/// Header carrying the error code on JSON and REST error responses.
pub const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Parameter naming the operation for Query style services.
pub const ACTION_PARAM: &str = "Action";
/// Parameter carrying the API version for Query style services.
pub const VERSION_PARAM: &str = "Version";

/// The three legacy RPC styles a service can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// HTTP verb + path routing with plain JSON bodies.
    Rest,
    /// Operation in the target header, unwrapped JSON bodies.
    JsonRpc,
    /// Operation in the `Action` parameter, XML-wrapped responses.
    QueryRpc,
}

impl ProtocolKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::JsonRpc => "json_rpc",
            Self::QueryRpc => "query_rpc",
        }
    }
}

/// Historical sub-version of the JSON-RPC protocol. Fixed per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JsonVersion {
    #[default]
    V1_0,
    V1_1,
}

impl JsonVersion {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::V1_0 => "application/x-amz-json-1.0",
            Self::V1_1 => "application/x-amz-json-1.1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_versions_have_distinct_content_types() {
        assert_eq!(JsonVersion::V1_0.content_type(), "application/x-amz-json-1.0");
        assert_eq!(JsonVersion::V1_1.content_type(), "application/x-amz-json-1.1");
    }

    #[test]
    fn protocol_kind_labels() {
        assert_eq!(ProtocolKind::Rest.as_str(), "rest");
        assert_eq!(ProtocolKind::JsonRpc.as_str(), "json_rpc");
        assert_eq!(ProtocolKind::QueryRpc.as_str(), "query_rpc");
    }
}
