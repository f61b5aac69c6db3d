use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::{
    config::RoleConfig,
    evaluator::RoleEvaluator,
    guard::{Guard, GuardCheck},
    subject::{CurrentSubject, ResolverState, SubjectResolver},
};

/// FailureHandler
///
/// A denial handler: consumes the request and produces the terminating
/// response (a redirect to a login page, a custom error body, and so on).
/// Handlers are invoked at most once per denial; there is no retry and no way
/// to resume the inner service after one runs.
pub type FailureHandler = Arc<dyn Fn(Request<Body>) -> Response + Send + Sync>;

/// The options and shared configuration behind a gate. Private: the public
/// surface is the cheaply-cloneable [`AccessGate`] handle.
struct GateInner {
    config: Arc<RoleConfig>,
    on_authorized_failure: Option<FailureHandler>,
    on_unauthorized_failure: Option<FailureHandler>,
    resolver: Option<ResolverState>,
}

/// AccessGate
///
/// The process-wide authorization gate. One instance is built at startup from
/// a [`RoleConfig`] plus optional construction-time options (the two
/// process-wide failure handlers and a subject resolver), and is then
/// immutable: cloning shares the same inner state, and nothing can be
/// reconfigured once traffic is flowing.
///
/// The gate produces two kinds of pipeline pieces:
/// - [`initialize`](AccessGate::initialize), the per-request initialization
///   layer that attaches a fresh [`RoleEvaluator`] to every request, and
/// - the guard factories ([`is`](AccessGate::is), [`is_any`](AccessGate::is_any),
///   [`can`](AccessGate::can), ...), each returning a reusable [`Guard`]
///   layer for `Router::route_layer`.
#[derive(Clone)]
pub struct AccessGate {
    inner: Arc<GateInner>,
}

impl AccessGate {
    /// Builds a gate with no failure handlers and the default subject lookup
    /// (the [`CurrentSubject`] request extension).
    pub fn new(config: RoleConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: RoleConfig) -> AccessGateBuilder {
        AccessGateBuilder {
            config,
            on_authorized_failure: None,
            on_unauthorized_failure: None,
            resolver: None,
        }
    }

    /// initialize
    ///
    /// The request-initialization layer. For each request it creates a fresh
    /// evaluator bound to the shared configuration, resolves the acting
    /// subject (registered resolver first, [`CurrentSubject`] extension
    /// otherwise), assigns roles or marks the evaluator authorized, and
    /// attaches the evaluator to the request extensions. After the inner
    /// service completes, the evaluator is mirrored into the response
    /// extensions for downstream rendering.
    ///
    /// The layer always forwards to the inner service; it never denies.
    pub fn initialize(&self) -> GateLayer {
        GateLayer { gate: self.clone() }
    }

    // --- Guard Factories ---

    /// Guard requiring the single named role.
    pub fn is(&self, role: impl Into<String>) -> Guard {
        Guard::new(self.clone(), GuardCheck::All(vec![role.into()]))
    }

    /// Guard requiring **every** listed role (logical AND).
    pub fn is_all<I>(&self, roles: I) -> Guard
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Guard::new(
            self.clone(),
            GuardCheck::All(roles.into_iter().map(Into::into).collect()),
        )
    }

    /// Guard requiring **at least one** listed role (logical OR).
    pub fn is_any<I>(&self, roles: I) -> Guard
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Guard::new(
            self.clone(),
            GuardCheck::Any(roles.into_iter().map(Into::into).collect()),
        )
    }

    /// Guard requiring an authorized evaluator. On denial, the gate's
    /// authorized-failure handler stands in as the per-call fallback when the
    /// guard carries none of its own.
    pub fn is_authorized(&self) -> Guard {
        Guard::new(self.clone(), GuardCheck::Authorized)
    }

    /// Guard requiring an unauthorized evaluator. A request with no evaluator
    /// attached passes unconditionally (absence is unauthorized by default).
    /// On denial, the gate's unauthorized-failure handler stands in as the
    /// per-call fallback when the guard carries none of its own.
    pub fn is_unauthorized(&self) -> Guard {
        Guard::new(self.clone(), GuardCheck::Unauthorized)
    }

    /// Guard requiring the named permission through some held role. This
    /// guard has no gate-level default fallback; denial goes straight through
    /// the precedence chain.
    pub fn can(&self, permission: impl Into<String>) -> Guard {
        Guard::new(self.clone(), GuardCheck::Can(permission.into()))
    }

    // --- Crate-internal accessors ---

    pub(crate) fn config(&self) -> Arc<RoleConfig> {
        self.inner.config.clone()
    }

    pub(crate) fn resolver(&self) -> Option<ResolverState> {
        self.inner.resolver.clone()
    }

    pub(crate) fn authorized_failure_handler(&self) -> Option<FailureHandler> {
        self.inner.on_authorized_failure.clone()
    }

    pub(crate) fn unauthorized_failure_handler(&self) -> Option<FailureHandler> {
        self.inner.on_unauthorized_failure.clone()
    }

    /// deny
    ///
    /// The failure-handling precedence chain, shared by every guard:
    ///
    /// 1. A per-call fallback (already resolved by the guard, including the
    ///    gate-default stand-ins for the two authorization guards) wins
    ///    outright.
    /// 2. An authorized evaluator routes to the authorized-failure handler,
    ///    when one is registered.
    /// 3. An unauthorized evaluator routes to the unauthorized-failure
    ///    handler, when one is registered. A request with no evaluator
    ///    attached counts as unauthorized here.
    /// 4. Otherwise the pipeline terminates with an empty 403.
    pub(crate) fn deny(
        &self,
        evaluator: Option<&RoleEvaluator>,
        fallback: Option<FailureHandler>,
        request: Request<Body>,
    ) -> Response {
        if let Some(handler) = fallback {
            return handler(request);
        }

        let authorized = evaluator.is_some_and(RoleEvaluator::is_authorized);
        if authorized {
            if let Some(handler) = &self.inner.on_authorized_failure {
                return handler(request);
            }
        } else if let Some(handler) = &self.inner.on_unauthorized_failure {
            return handler(request);
        }

        StatusCode::FORBIDDEN.into_response()
    }
}

/// AccessGateBuilder
///
/// Construction-time options for the gate. The recognized options are exactly
/// the two process-wide failure handlers and the subject resolver; everything
/// is fixed at [`build`](AccessGateBuilder::build), so there is no
/// registration race to worry about once the process serves traffic.
pub struct AccessGateBuilder {
    config: RoleConfig,
    on_authorized_failure: Option<FailureHandler>,
    on_unauthorized_failure: Option<FailureHandler>,
    resolver: Option<ResolverState>,
}

impl AccessGateBuilder {
    /// Process-wide handler for denials of requests that *are* authorized
    /// (typically "you are logged in but lack this role").
    pub fn on_authorized_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(Request<Body>) -> Response + Send + Sync + 'static,
    {
        self.on_authorized_failure = Some(Arc::new(handler));
        self
    }

    /// Process-wide handler for denials of unauthorized requests (typically a
    /// redirect to a login page).
    pub fn on_unauthorized_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(Request<Body>) -> Response + Send + Sync + 'static,
    {
        self.on_unauthorized_failure = Some(Arc::new(handler));
        self
    }

    /// Overrides how the acting subject is derived from the request,
    /// replacing the [`CurrentSubject`] extension lookup.
    pub fn subject_resolver<R>(mut self, resolver: R) -> Self
    where
        R: SubjectResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn build(self) -> AccessGate {
        AccessGate {
            inner: Arc::new(GateInner {
                config: Arc::new(self.config),
                on_authorized_failure: self.on_authorized_failure,
                on_unauthorized_failure: self.on_unauthorized_failure,
                resolver: self.resolver,
            }),
        }
    }
}

// --- Initialization Layer ---

/// GateLayer
///
/// Tower layer form of the initialization step; see
/// [`AccessGate::initialize`].
#[derive(Clone)]
pub struct GateLayer {
    gate: AccessGate,
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            gate: self.gate.clone(),
            inner,
        }
    }
}

/// GateService
///
/// The per-request initialization service produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S> {
    gate: AccessGate,
    inner: S,
}

impl<S> Service<Request<Body>> for GateService<S>
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

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // Swap in the clone so the instance polled ready is the one driven.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let mut evaluator = RoleEvaluator::new(gate.config());

            let subject = match gate.resolver() {
                Some(resolver) => resolver.resolve(&request).await,
                None => request
                    .extensions()
                    .get::<CurrentSubject>()
                    .map(|current| current.0.clone()),
            };

            match subject {
                Some(subject) if !subject.roles.is_empty() => evaluator.add_roles(subject.roles),
                // A logged-in subject with no specific role is still authorized.
                Some(_) => evaluator.set_authorized(true),
                // No subject: the evaluator stays unauthorized with no roles.
                None => {}
            }

            tracing::trace!(
                authorized = evaluator.is_authorized(),
                roles = ?evaluator.roles(),
                "request role context initialized"
            );

            request.extensions_mut().insert(evaluator.clone());
            let mut response = inner.call(request).await?;
            // Mirror the evaluator for downstream rendering, the
            // view-locals equivalent of the request attachment.
            response.extensions_mut().insert(evaluator);
            Ok(response)
        })
    }
}
