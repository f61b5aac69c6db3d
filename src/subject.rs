use async_trait::async_trait;
use axum::{body::Body, http::Request};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Subject
///
/// The acting principal behind a request, as resolved during request
/// initialization. A subject with an empty `roles` list is "logged in, no
/// specific role" and is still authorized; the distinction between that and
/// no subject at all drives the evaluator's initial state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Subject {
    /// Stable identifier of the principal, when the session layer knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Role names granted to the principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Subject {
    /// Convenience constructor for the common single-role case.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            id: None,
            roles: vec![role.into()],
        }
    }

    pub fn with_roles<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            id: None,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// CurrentSubject
///
/// Typed request-extension carrier for the default subject lookup path. The
/// host's session or authentication layer inserts this into the request
/// extensions *before* the gate's initialization layer runs; an absent
/// extension means nobody is logged in. Hosts that derive the subject some
/// other way register a [`SubjectResolver`] instead, which takes precedence.
#[derive(Debug, Clone)]
pub struct CurrentSubject(pub Subject);

/// SubjectResolver
///
/// Pluggable override for how the acting subject is derived from a request.
/// When registered on the gate, it replaces the [`CurrentSubject`] extension
/// lookup entirely; returning `None` means no subject, regardless of what the
/// session layer put on the request.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn SubjectResolver>`) safely shareable across the router's
/// asynchronous task boundaries, and the async seam accommodates session
/// stores that need a lookup.
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, request: &Request<Body>) -> Option<Subject>;
}

/// ResolverState
///
/// The concrete type used to share a resolver with the gate.
pub type ResolverState = Arc<dyn SubjectResolver>;

/// FixedSubjectResolver
///
/// A resolver that returns the same preconfigured subject for every request.
/// Used by this crate's integration tests, and useful to hosts for pinning a
/// subject in development environments.
#[derive(Debug, Clone, Default)]
pub struct FixedSubjectResolver {
    pub subject: Option<Subject>,
}

impl FixedSubjectResolver {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject: Some(subject),
        }
    }

    /// A resolver that reports no subject, whatever the session layer says.
    pub fn anonymous() -> Self {
        Self { subject: None }
    }
}

#[async_trait]
impl SubjectResolver for FixedSubjectResolver {
    async fn resolve(&self, _request: &Request<Body>) -> Option<Subject> {
        self.subject.clone()
    }
}
