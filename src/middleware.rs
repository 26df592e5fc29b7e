//! Tower middleware that gates a service behind quota evaluation.
//!
//! [`QuotaLayer`] wraps an inner service. Each request names a user and a category through
//! [`QuotaSubject`]; only `Allowed` requests reach the inner service.

use crate::error::QuotaError;
use crate::evaluator::{Decision, QuotaEvaluator};
use crate::model::ResourceCategory;
use crate::store::RecordStore;
use crate::telemetry::TelemetrySink;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;

/// Requests that can be charged against a quota.
pub trait QuotaSubject {
    fn user_id(&self) -> &str;
    fn category(&self) -> ResourceCategory;
}

/// Error returned by [`QuotaGate`].
#[derive(Debug)]
pub enum QuotaGateError<E> {
    /// The quota for the request's category is exhausted.
    LimitExceeded { category: ResourceCategory, amount_consumed: u32, available_in: Duration },
    /// Evaluation itself failed (unknown user, missing policy, storage).
    Rejected(QuotaError),
    /// The inner service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for QuotaGateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded { category, amount_consumed, available_in } => write!(
                f,
                "{} limit exceeded ({} consumed, available in {:?})",
                category, amount_consumed, available_in
            ),
            Self::Rejected(e) => write!(f, "quota evaluation failed: {}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for QuotaGateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::Inner(e) => Some(e),
            Self::LimitExceeded { .. } => None,
        }
    }
}

impl<E> QuotaGateError<E> {
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// A layer that enforces quotas using a [`QuotaEvaluator`].
#[derive(Debug)]
pub struct QuotaLayer<S, T> {
    evaluator: QuotaEvaluator<S, T>,
}

impl<S, T: Clone> Clone for QuotaLayer<S, T> {
    fn clone(&self) -> Self {
        Self { evaluator: self.evaluator.clone() }
    }
}

impl<S, T> QuotaLayer<S, T> {
    pub fn new(evaluator: QuotaEvaluator<S, T>) -> Self {
        Self { evaluator }
    }
}

impl<Svc, S, T: Clone> Layer<Svc> for QuotaLayer<S, T> {
    type Service = QuotaGate<Svc, S, T>;

    fn layer(&self, service: Svc) -> Self::Service {
        QuotaGate { inner: service, evaluator: self.evaluator.clone() }
    }
}

/// Middleware service that enforces quotas.
#[derive(Debug)]
pub struct QuotaGate<Svc, S, T> {
    inner: Svc,
    evaluator: QuotaEvaluator<S, T>,
}

impl<Svc: Clone, S, T: Clone> Clone for QuotaGate<Svc, S, T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), evaluator: self.evaluator.clone() }
    }
}

impl<Svc, S, T, Req> Service<Req> for QuotaGate<Svc, S, T>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    Svc::Error: Send + 'static,
    S: RecordStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
    Req: QuotaSubject + Send + 'static,
{
    type Response = Svc::Response;
    type Error = QuotaGateError<Svc::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(QuotaGateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let evaluator = self.evaluator.clone();
        // Use the clone that was driven to readiness; leave a fresh clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let user_id = req.user_id().to_string();
        let category = req.category();

        Box::pin(async move {
            match evaluator.evaluate(&user_id, category).await {
                Ok(Decision::Allowed { .. }) => inner.call(req).await.map_err(QuotaGateError::Inner),
                Ok(Decision::LimitExceeded { category, amount_consumed, available_in }) => {
                    Err(QuotaGateError::LimitExceeded { category, amount_consumed, available_in })
                }
                Err(e) => Err(QuotaGateError::Rejected(e)),
            }
        })
    }
}
