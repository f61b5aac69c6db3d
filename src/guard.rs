use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, http::Request, response::Response};
use tower::{Layer, Service};

use crate::{
    evaluator::RoleEvaluator,
    gate::{AccessGate, FailureHandler},
};

/// The evaluator query a guard applies before letting a request through.
#[derive(Debug, Clone)]
pub(crate) enum GuardCheck {
    /// Every listed role must be held.
    All(Vec<String>),
    /// At least one listed role must be held.
    Any(Vec<String>),
    Authorized,
    Unauthorized,
    Can(String),
}

impl GuardCheck {
    fn name(&self) -> &'static str {
        match self {
            GuardCheck::All(_) => "is",
            GuardCheck::Any(_) => "is_any",
            GuardCheck::Authorized => "is_authorized",
            GuardCheck::Unauthorized => "is_unauthorized",
            GuardCheck::Can(_) => "can",
        }
    }

    /// Applies the query against the request's evaluator. A request with no
    /// evaluator attached fails every check except `Unauthorized`, which
    /// treats absence as unauthorized and passes.
    fn passes(&self, evaluator: Option<&RoleEvaluator>) -> bool {
        match (self, evaluator) {
            (GuardCheck::Unauthorized, None) => true,
            (_, None) => false,
            (GuardCheck::All(roles), Some(evaluator)) => evaluator.is_all(roles),
            (GuardCheck::Any(roles), Some(evaluator)) => evaluator.is_any(roles),
            (GuardCheck::Authorized, Some(evaluator)) => evaluator.is_authorized(),
            (GuardCheck::Unauthorized, Some(evaluator)) => evaluator.is_unauthorized(),
            (GuardCheck::Can(permission), Some(evaluator)) => evaluator.can(permission),
        }
    }
}

/// Guard
///
/// A reusable route-level authorization step, produced by the gate's guard
/// factories and applied with `Router::route_layer`. Each guard holds one
/// evaluator query and an optional per-call fallback handler; it carries no
/// per-request state, so a single guard value can protect any number of
/// routes.
#[derive(Clone)]
pub struct Guard {
    gate: AccessGate,
    check: GuardCheck,
    fallback: Option<FailureHandler>,
}

impl Guard {
    pub(crate) fn new(gate: AccessGate, check: GuardCheck) -> Self {
        Self {
            gate,
            check,
            fallback: None,
        }
    }

    /// on_failure
    ///
    /// Attaches a fallback handler invoked whenever this guard denies a
    /// request, ahead of the gate's process-wide handlers and the default
    /// 403.
    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(Request<Body>) -> Response + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// The handler consulted first on denial: the attached fallback, or for
    /// the two authorization guards the matching gate-wide handler standing
    /// in for it.
    fn effective_fallback(&self) -> Option<FailureHandler> {
        self.fallback.clone().or_else(|| match self.check {
            GuardCheck::Authorized => self.gate.authorized_failure_handler(),
            GuardCheck::Unauthorized => self.gate.unauthorized_failure_handler(),
            _ => None,
        })
    }
}

impl<S> Layer<S> for Guard {
    type Service = GuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardService {
            guard: self.clone(),
            inner,
        }
    }
}

/// GuardService
///
/// The per-route service produced by a [`Guard`] layer. Consults the
/// evaluator attached by the initialization layer and either forwards to the
/// inner service or terminates the chain through the gate's failure-handling
/// precedence.
#[derive(Clone)]
pub struct GuardService<S> {
    guard: Guard,
    inner: S,
}

impl<S> Service<Request<Body>> for GuardService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Swap in the clone so the instance polled ready is the one driven.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = self.guard.clone();

        Box::pin(async move {
            if guard
                .check
                .passes(request.extensions().get::<RoleEvaluator>())
            {
                return inner.call(request).await;
            }

            tracing::debug!(guard = guard.check.name(), "request denied");
            let evaluator = request.extensions().get::<RoleEvaluator>().cloned();
            let fallback = guard.effective_fallback();
            Ok(guard.gate.deny(evaluator.as_ref(), fallback, request))
        })
    }
}
