//! Pipeline composition: wraps the gateway service in its middleware layers.

use std::sync::Arc;

use cumulus_core::Gateway;
use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::gateway::GatewayService;

/// The composed gateway service handed to the HTTP handlers.
pub type GatewayPipeline = MetricsService<GatewayService>;

/// Build the gateway pipeline by wrapping a `GatewayService` with middleware layers.
///
/// CORS and compression live on the HTTP router and the request deadline in
/// the gateway handler; this stack only sees resolved-or-rejected calls.
#[must_use]
pub fn build_gateway_pipeline(gateway: Arc<Gateway>) -> GatewayPipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .service(GatewayService::new(gateway))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use cumulus_core::InboundRequest;
    use http::{Method, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::service::catalog::build_gateway;
    use crate::service::config::ServerConfig;

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let pipeline = build_gateway_pipeline(build_gateway(&ServerConfig::default()).unwrap());
        let request = InboundRequest::new(Method::POST, "/")
            .with_query("Action=DescribeDBInstances");
        let response = pipeline.oneshot(request).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("text/xml"));
        assert!(response
            .body_text()
            .starts_with("<DescribeDBInstancesResponse"));
    }
}
