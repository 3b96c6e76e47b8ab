//! Metrics middleware for gateway requests.
//!
//! Every request runs inside a `tracing` span and is recorded through the
//! `metrics` facade: a request counter and a latency histogram labelled by
//! service, operation and HTTP status. Without an installed recorder the
//! facade calls are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use cumulus_core::{EncodedResponse, InboundRequest};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

pub const REQUESTS_TOTAL: &str = "cumulus_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "cumulus_request_duration_seconds";

/// Label used when no service claimed the request.
const UNROUTED: &str = "unrouted";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments gateway requests.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<InboundRequest> for MetricsService<S>
where
    S: Service<InboundRequest, Response = EncodedResponse> + Send,
    S::Future: Send + 'static,
{
    type Response = EncodedResponse;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<EncodedResponse, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: InboundRequest) -> Self::Future {
        let span = info_span!(
            "gateway",
            method = %request.method,
            path = %request.path,
            service = tracing::field::Empty,
            operation = tracing::field::Empty,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                if let Ok(response) = &result {
                    let (service, operation) = response.served_by.as_ref().map_or(
                        (UNROUTED.to_string(), UNROUTED.to_string()),
                        |served| (served.service.clone(), served.operation.clone()),
                    );
                    let status = response.status.as_u16();

                    #[allow(clippy::cast_possible_truncation)]
                    let duration_ms = elapsed.as_millis() as u64;
                    let span = tracing::Span::current();
                    span.record("service", service.as_str());
                    span.record("operation", operation.as_str());
                    span.record("status", status);
                    span.record("duration_ms", duration_ms);

                    tracing::info!(
                        service = %service,
                        operation = %operation,
                        status,
                        duration_ms,
                        "request complete"
                    );

                    let labels = [
                        ("service", service),
                        ("operation", operation),
                        ("status", status.to_string()),
                    ];
                    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
                    metrics::histogram!(REQUEST_DURATION_SECONDS, &labels)
                        .record(elapsed.as_secs_f64());
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http::{Method, StatusCode};
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service for metrics testing.
    struct ImmediateService;

    impl Service<InboundRequest> for ImmediateService {
        type Response = EncodedResponse;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<EncodedResponse, Infallible>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: InboundRequest) -> Self::Future {
            Box::pin(async move {
                Ok(
                    EncodedResponse::new(StatusCode::CREATED, "application/json", "{}")
                        .with_served_by("ses", "CreateEmailIdentity"),
                )
            })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(ImmediateService);
        let response = svc
            .oneshot(InboundRequest::new(Method::POST, "/ses/v2/email/identities"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(
            response.served_by.unwrap().operation,
            "CreateEmailIdentity"
        );
    }
}
