//! HTTP layers wrapped around every route of the emulator listener.
//!
//! Layers only observe or decorate traffic. Anything that can fail a request
//! (body limits, the request deadline) lives in the gateway handler so the
//! client always receives a protocol-encoded error.

use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

type HttpTrace = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Layers produced by [`build_http_layers`], outermost last.
type HttpLayers = Stack<CorsLayer, Stack<CompressionLayer, Stack<HttpTrace, Identity>>>;

/// Builds the listener's layers, outermost first:
///
/// 1. `Trace`: one span per HTTP exchange
/// 2. `Compression`: gzip when the client accepts it
/// 3. `CORS`: browser SDKs call the emulator cross-origin
///
/// Request ids are not assigned here: the gateway stamps `x-amzn-RequestId`
/// on every response it encodes.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .into_inner()
}

/// `"*"` anywhere in `origins` allows every origin; otherwise unparsable
/// entries are skipped. Methods and headers are unrestricted because REST
/// services route on every verb and SDKs send signing headers.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn router(origins: &[&str]) -> Router {
        let config = NetworkConfig {
            cors_origins: origins.iter().map(ToString::to_string).collect(),
            ..NetworkConfig::default()
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(build_http_layers(&config))
    }

    #[tokio::test]
    async fn wildcard_origin_is_echoed_as_any() {
        let response = router(&["*"])
            .oneshot(
                Request::get("/")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_cors_header() {
        let response = router(&["https://console.example.com", "not a url\u{0}"])
            .oneshot(
                Request::get("/")
                    .header("origin", "http://elsewhere.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn listed_origin_is_allowed() {
        let response = router(&["https://console.example.com"])
            .oneshot(
                Request::get("/")
                    .header("origin", "https://console.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://console.example.com"
        );
    }
}
