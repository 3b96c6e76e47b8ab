//! Single request entry point: resolve with the [`Router`], run with the
//! [`Dispatcher`].

use std::sync::Arc;

use crate::codec::EncodedResponse;
use crate::dispatch::Dispatcher;
use crate::registry::Registry;
use crate::router::{InboundRequest, Router};

/// Router and dispatcher composed over one immutable registry.
#[derive(Debug, Clone)]
pub struct Gateway {
    router: Router,
    dispatcher: Dispatcher,
}

impl Gateway {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            router: Router::new(registry),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Handles one request end to end. Always yields a well-formed response;
    /// requests no service claims get a JSON 1.0 `InvalidAction` error.
    pub async fn handle(&self, request: InboundRequest) -> EncodedResponse {
        match self.router.resolve(&request) {
            Ok(resolved) => self.dispatcher.dispatch(resolved).await,
            Err(no_match) => self.dispatcher.reject(&no_match),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.router.registry()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use serde_json::{json, Value};

    use super::*;
    use crate::descriptor::{
        JsonRpcSpec, OperationInput, QueryRpcSpec, RestSpec, ServiceDescriptor, ServiceHandler,
    };
    use crate::error::{HandlerError, ProtocolError};
    use crate::protocol::JsonVersion;

    struct Named(&'static str);

    #[async_trait]
    impl ServiceHandler for Named {
        async fn dispatch(
            &self,
            operation: &str,
            input: OperationInput,
        ) -> Result<Value, HandlerError> {
            if operation == "Unknown" {
                return Err(ProtocolError::unknown_operation(operation).into());
            }
            Ok(json!({
                "Service": self.0,
                "Operation": operation,
                "Params": input.path_params,
            }))
        }
    }

    fn gateway() -> Gateway {
        let registry = Registry::from_descriptors([
            ServiceDescriptor::new(
                "ses",
                RestSpec::new("/ses").route(
                    Method::GET,
                    "/v2/email/identities/{EmailIdentity}",
                    "GetEmailIdentity",
                ),
                Arc::new(Named("ses")),
            ),
            ServiceDescriptor::new(
                "dynamodb",
                JsonRpcSpec::new("DynamoDB_20120810", JsonVersion::V1_0),
                Arc::new(Named("dynamodb")),
            ),
            ServiceDescriptor::new(
                "rds",
                QueryRpcSpec::new("urn:rds", ["CreateDBInstance"]),
                Arc::new(Named("rds")),
            ),
        ])
        .unwrap();
        Gateway::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn each_protocol_reaches_its_service() {
        let gw = gateway();

        let rest = gw
            .handle(InboundRequest::new(
                Method::GET,
                "/ses/v2/email/identities/a@b.c",
            ))
            .await;
        assert_eq!(rest.status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&rest.body).unwrap();
        assert_eq!(body["Params"]["EmailIdentity"], "a@b.c");

        let json = gw
            .handle(
                InboundRequest::new(Method::POST, "/")
                    .with_header("X-Amz-Target", "DynamoDB_20120810.GetItem"),
            )
            .await;
        assert_eq!(json.status, StatusCode::OK);
        assert_eq!(json.content_type(), Some("application/x-amz-json-1.0"));
        let served = json.served_by.unwrap();
        assert_eq!((served.service.as_str(), served.operation.as_str()), ("dynamodb", "GetItem"));

        let query = gw
            .handle(InboundRequest::new(Method::POST, "/").with_query("Action=CreateDBInstance"))
            .await;
        assert_eq!(query.status, StatusCode::OK);
        assert!(query
            .body_text()
            .starts_with("<CreateDBInstanceResponse xmlns=\"urn:rds\">"));
    }

    #[tokio::test]
    async fn unknown_operation_on_known_target() {
        let resp = gateway()
            .handle(
                InboundRequest::new(Method::POST, "/")
                    .with_header("X-Amz-Target", "DynamoDB_20120810.Unknown"),
            )
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["__type"], "UnknownOperationException");
    }

    #[tokio::test]
    async fn unrouted_request_gets_invalid_action() {
        let resp = gateway()
            .handle(InboundRequest::new(Method::POST, "/").with_header("X-Amz-Target", "Bogus.Foo"))
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["__type"], "InvalidAction");

        let bare = gateway().handle(InboundRequest::new(Method::GET, "/")).await;
        assert_eq!(bare.status, StatusCode::BAD_REQUEST);
        assert!(bare.request_id().is_some());
    }
}
