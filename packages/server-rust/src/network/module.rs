//! Network module with deferred startup lifecycle.
//!
//! `new()` takes the finished gateway, `start()` binds the TCP listener and
//! `serve()` accepts connections until shutdown. The registry is therefore
//! complete before the port opens.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::routing::{get, post};
use axum::Router;
use cumulus_core::Gateway;
use tokio::net::TcpListener;
use tracing::info;

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    gateway_handler, health_handler, liveness_handler, readiness_handler, reset_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;

/// Manages the HTTP listener lifecycle.
///
/// 1. `new()` -- builds shared state around the gateway
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, gateway: Arc<Gateway>) -> Self {
        let state = AppState::new(
            gateway,
            Arc::new(ShutdownController::new()),
            config.clone(),
        );
        Self {
            config,
            listener: None,
            state,
        }
    }

    /// Shared shutdown controller, for health checks or triggering shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    /// - `POST /_emulator/reset` -- clear all service state
    /// - everything else, including other methods on the paths above --
    ///   the gateway, so even a misdirected call gets an encoded error
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/_emulator/reset", post(reset_handler))
            .method_not_allowed_fallback(gateway_handler)
            .fallback(gateway_handler)
            .layer(build_http_layers(&self.config))
            .with_state(self.state.clone())
    }

    /// Binds the TCP listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then drains.
    ///
    /// Health reports `draining` from the moment `shutdown` fires. Open
    /// connections get `drain_timeout` to finish before the listener is
    /// dropped regardless.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, if TLS material
    /// cannot be loaded, or on a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let controller = Arc::clone(&self.state.shutdown);
        let shutdown = controller.draining_on(shutdown);
        let drain_timeout = self.config.drain_timeout;

        controller.set_ready();

        let serving = async {
            match &self.config.tls {
                Some(tls_config) => {
                    serve_tls(listener, router, tls_config, drain_timeout, shutdown).await
                }
                None => serve_plain(listener, router, shutdown).await,
            }
        };

        tokio::select! {
            result = serving => result?,
            () = controller.drain_expired(drain_timeout) => {}
        }

        controller.finish();
        info!("Listener stopped");
        Ok(())
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Serving plain HTTP connections");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serves TLS connections using `axum-server` with rustls, reusing the
/// pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: &TlsConfig,
    drain_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls_config.cert_path, &tls_config.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(Some(drain_timeout));
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::test_support::{slow_gateway, SLOW_TARGET_PREFIX};
    use crate::network::HealthState;
    use crate::service::{build_gateway, ServerConfig};

    fn module() -> NetworkModule {
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..NetworkConfig::default()
        };
        NetworkModule::new(config, build_gateway(&ServerConfig::default()).unwrap())
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn target(target: &str, body: &str) -> Request<Body> {
        Request::post("/")
            .header("x-amz-target", target)
            .header("content-type", "application/x-amz-json-1.0")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn rest_create_identity() {
        let router = module().build_router();
        let request = Request::post("/ses/v2/email/identities")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"EmailIdentity":"a@example.com"}"#))
            .unwrap();
        let (status, headers, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""IdentityType":"EMAIL_ADDRESS""#));
        assert!(headers.contains_key("x-amzn-requestid"));
    }

    #[tokio::test]
    async fn json_target_routes_to_dynamodb() {
        let router = module().build_router();
        let (status, headers, body) =
            send(&router, target("DynamoDB_20120810.GetItem", r#"{"TableName":"T","Key":{}}"#))
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["__type"], "ResourceNotFoundException");
        assert_eq!(
            headers.get("x-amzn-errortype").unwrap(),
            "ResourceNotFoundException"
        );
    }

    #[tokio::test]
    async fn known_prefix_unknown_operation() {
        let router = module().build_router();
        let (status, _, body) = send(&router, target("DynamoDB_20120810.Frobnicate", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("UnknownOperationException"));
    }

    #[tokio::test]
    async fn bogus_target_is_invalid_action() {
        let router = module().build_router();
        let (status, _, body) = send(&router, target("Bogus.Foo", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["__type"], "InvalidAction");
    }

    #[tokio::test]
    async fn query_action_routes_to_rds() {
        let router = module().build_router();
        let request = Request::post("/?Action=CreateDBInstance")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "DBInstanceIdentifier": "db1",
                    "DBInstanceClass": "db.t3.micro",
                    "Engine": "mysql",
                    "AllocatedStorage": 20
                })
                .to_string(),
            ))
            .unwrap();
        let (status, headers, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("content-type").unwrap(), "text/xml");
        assert!(body.starts_with(
            r#"<CreateDBInstanceResponse xmlns="http://rds.amazonaws.com/doc/2014-10-31/">"#
        ));
        assert!(body.contains("<DBInstanceIdentifier>db1</DBInstanceIdentifier>"));
    }

    #[tokio::test]
    async fn form_encoded_query_request() {
        let router = module().build_router();
        let request = Request::post("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("Action=DescribeDBInstances&Version=2014-10-31"))
            .unwrap();
        let (status, _, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<DBInstances></DBInstances>"));
    }

    #[tokio::test]
    async fn headerless_unmatched_request_gets_json_error() {
        let router = module().build_router();
        let request = Request::get("/nothing/here").body(Body::empty()).unwrap();
        let (status, headers, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            headers.get("content-type").unwrap(),
            "application/x-amz-json-1.0"
        );
        assert!(body.contains("InvalidAction"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = NetworkConfig {
            max_body_bytes: 8,
            ..NetworkConfig::default()
        };
        let router = NetworkModule::new(config, build_gateway(&ServerConfig::default()).unwrap())
            .build_router();
        let (status, _, body) =
            send(&router, target("DynamoDB_20120810.ListTables", r#"{"Limit": 10}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("SerializationException"));
    }

    #[tokio::test]
    async fn reset_endpoint_clears_state() {
        let router = module().build_router();
        send(
            &router,
            target(
                "secretsmanager.CreateSecret",
                r#"{"Name":"s","SecretString":"v"}"#,
            ),
        )
        .await;

        let reset = Request::post("/_emulator/reset").body(Body::empty()).unwrap();
        let (status, _, _) = send(&router, reset).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, body) = send(&router, target("secretsmanager.ListSecrets", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["SecretList"], json!([]));
    }

    #[tokio::test]
    async fn health_routes_are_not_gatewayed() {
        let module = module();
        module.shutdown_controller().set_ready();
        let router = module.build_router();

        let (status, _, body) =
            send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"state\":\"ready\""));

        let (status, _, _) =
            send(&router, Request::get("/health/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_requires_start() {
        let err = module().serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn serve_drains_after_shutdown() {
        let mut module = module();
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        module.serve(async {}).await.unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn wrong_method_on_internal_path_gets_encoded_error() {
        let router = module().build_router();
        for request in [
            Request::post("/health").body(Body::empty()).unwrap(),
            Request::get("/_emulator/reset").body(Body::empty()).unwrap(),
        ] {
            let (status, headers, body) = send(&router, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(headers.contains_key("x-amzn-requestid"));
            assert!(body.contains("InvalidAction"));
        }
    }

    #[tokio::test]
    async fn slow_gateway_call_times_out_with_encoded_error() {
        let config = NetworkConfig {
            request_timeout: Duration::from_millis(50),
            ..NetworkConfig::default()
        };
        let router =
            NetworkModule::new(config, slow_gateway(Duration::from_millis(300))).build_router();
        let (status, headers, body) =
            send(&router, target(&format!("{SLOW_TARGET_PREFIX}.Nap"), "{}")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            headers.get("content-type").unwrap(),
            "application/x-amz-json-1.0"
        );
        assert!(headers.contains_key("x-amzn-requestid"));
        assert_eq!(headers.get("x-amzn-errortype").unwrap(), "ServiceUnavailable");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["__type"], "ServiceUnavailable");
    }

    #[tokio::test]
    async fn slow_gateway_call_within_deadline_succeeds() {
        let router = NetworkModule::new(
            NetworkConfig::default(),
            slow_gateway(Duration::from_millis(20)),
        )
        .build_router();
        let (status, _, body) =
            send(&router, target(&format!("{SLOW_TARGET_PREFIX}.Nap"), "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Rested"));
    }

    /// Starts a listener over a gateway whose only action takes `delay`,
    /// sends one request to it and waits until the handler holds its guard.
    async fn serve_with_open_request(
        delay: Duration,
        drain_timeout: Duration,
    ) -> (
        Arc<ShutdownController>,
        tokio::sync::oneshot::Sender<()>,
        tokio::task::JoinHandle<anyhow::Result<()>>,
        tokio::net::TcpStream,
    ) {
        use tokio::io::AsyncWriteExt;

        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            drain_timeout,
            ..NetworkConfig::default()
        };
        let mut module = NetworkModule::new(config, slow_gateway(delay));
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = stopped.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        let request = format!(
            "POST / HTTP/1.1\r\nHost: localhost\r\nX-Amz-Target: {SLOW_TARGET_PREFIX}.Nap\r\n\
             Content-Type: application/x-amz-json-1.0\r\nContent-Length: 2\r\n\
             Connection: close\r\n\r\n{{}}"
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        for _ in 0..200 {
            if controller.in_flight_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(controller.in_flight_count(), 1);
        (controller, stop, server, stream)
    }

    #[tokio::test]
    async fn health_reports_draining_while_request_is_open() {
        use tokio::io::AsyncReadExt;

        let (controller, stop, server, mut stream) =
            serve_with_open_request(Duration::from_millis(300), Duration::from_secs(5)).await;

        stop.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.health_state(), HealthState::Draining);
        assert_eq!(controller.in_flight_count(), 1);

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Rested"));

        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn drain_timeout_caps_stuck_requests() {
        let (controller, stop, server, _stream) =
            serve_with_open_request(Duration::from_secs(30), Duration::from_millis(50)).await;

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(controller.in_flight_count(), 1);
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
