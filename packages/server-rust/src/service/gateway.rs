//! Tower adapter over the core [`Gateway`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cumulus_core::{EncodedResponse, Gateway, InboundRequest};
use tower::Service;

/// `tower::Service` that resolves and dispatches an [`InboundRequest`].
///
/// Never fails: routing and handler errors are already encoded in the
/// returned [`EncodedResponse`]. Always ready.
#[derive(Debug, Clone)]
pub struct GatewayService {
    gateway: Arc<Gateway>,
}

impl GatewayService {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl Service<InboundRequest> for GatewayService {
    type Response = EncodedResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<EncodedResponse, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: InboundRequest) -> Self::Future {
        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move { Ok(gateway.handle(request).await) })
    }
}
