use crate::error::GateError;
use crate::rate_limit::key::ClientId;
use crate::rate_limit::{Decision, RateLimiter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Pulls the client identifier out of a request.
pub trait ClientIdExtractor<Req>: Send + Sync + 'static {
    /// `None` when the request carries no usable identifier; the request then fails closed.
    fn client_id(&self, req: &Req) -> Option<ClientId>;
}

impl<Req, F> ClientIdExtractor<Req> for F
where
    F: Fn(&Req) -> Option<ClientId> + Send + Sync + 'static,
{
    fn client_id(&self, req: &Req) -> Option<ClientId> {
        self(req)
    }
}

/// A layer that enforces per-client quotas using a [`RateLimiter`].
#[derive(Debug)]
pub struct RateLimitLayer<L, X> {
    limiter: Arc<L>,
    extractor: Arc<X>,
}

impl<L, X> Clone for RateLimitLayer<L, X> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), extractor: self.extractor.clone() }
    }
}

impl<L, X> RateLimitLayer<L, X> {
    /// Create a new rate limit layer.
    pub fn new(limiter: L, extractor: X) -> Self {
        Self::from_shared(Arc::new(limiter), extractor)
    }

    /// Share a limiter that is already behind an `Arc`.
    pub fn from_shared(limiter: Arc<L>, extractor: X) -> Self {
        Self { limiter, extractor: Arc::new(extractor) }
    }
}

impl<S, L, X> Layer<S> for RateLimitLayer<L, X> {
    type Service = RateLimitService<S, L, X>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: self.limiter.clone(),
            extractor: self.extractor.clone(),
        }
    }
}

/// Middleware service that enforces per-client quotas.
///
/// Rejections and store failures short-circuit: the inner service is never called.
#[derive(Debug)]
pub struct RateLimitService<S, L, X> {
    inner: S,
    limiter: Arc<L>,
    extractor: Arc<X>,
}

impl<S: Clone, L, X> Clone for RateLimitService<S, L, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            extractor: self.extractor.clone(),
        }
    }
}

impl<S, L, X, Req> Service<Req> for RateLimitService<S, L, X>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: RateLimiter + 'static,
    X: ClientIdExtractor<Req>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let client = self.extractor.client_id(&req);
        // `poll_ready` readied `self.inner`; hand that one to the future and keep a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(client) = client else {
                tracing::warn!("request has no client identifier; failing closed");
                return Err(GateError::MissingClientId);
            };

            match limiter.check(&client).await {
                Ok(Decision::Admitted { .. }) => inner.call(req).await.map_err(GateError::Inner),
                Ok(Decision::Rejected { observed, limit, retry_after }) => {
                    Err(GateError::Rejected { observed, limit, retry_after })
                }
                // Store failed (e.g., Redis down). Never treated as admitted.
                Err(e) => Err(GateError::Store(e)),
            }
        })
    }
}
