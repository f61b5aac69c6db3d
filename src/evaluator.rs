use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use std::sync::Arc;

use crate::config::RoleConfig;

/// RoleEvaluator
///
/// The per-request authorization context. One instance is created by the
/// gate's initialization layer for every incoming request, mutated only while
/// the request is being initialized, and read-only afterwards. It holds the
/// set of role names granted to the request plus an `authorized` flag that is
/// deliberately independent of the role set: a request can be authorized with
/// zero roles ("logged in, no specific role"), and `set_authorized(false)` can
/// force an unauthorized state while roles remain queryable.
///
/// The evaluator carries its own handle to the shared [`RoleConfig`], so
/// permission queries need no other context. Cloning is cheap (an `Arc` plus
/// a small role list), which is what lets the initialization layer mirror the
/// instance into the response extensions for downstream rendering.
#[derive(Debug, Clone)]
pub struct RoleEvaluator {
    config: Arc<RoleConfig>,
    roles: Vec<String>,
    authorized: bool,
}

impl RoleEvaluator {
    /// Creates an evaluator in its initial state: unauthorized, no roles.
    pub fn new(config: Arc<RoleConfig>) -> Self {
        Self {
            config,
            roles: Vec::new(),
            authorized: false,
        }
    }

    /// True iff the single named role is currently held.
    pub fn is(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }

    /// is_all
    ///
    /// True iff **every** listed role is held (logical AND). An empty list is
    /// vacuously true. The AND here versus the OR in [`is_any`] is
    /// intentional; the two queries are not interchangeable.
    ///
    /// [`is_any`]: RoleEvaluator::is_any
    pub fn is_all<I>(&self, roles: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        roles.into_iter().all(|role| self.is(role.as_ref()))
    }

    /// is_any
    ///
    /// True iff **at least one** listed role is held (logical OR). An empty
    /// list yields false.
    pub fn is_any<I>(&self, roles: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        roles.into_iter().any(|role| self.is(role.as_ref()))
    }

    /// can
    ///
    /// True iff any currently-held role's configured grant list contains the
    /// permission. Roles missing from the configuration are skipped without
    /// error; holding no roles means no permissions.
    pub fn can(&self, permission: &str) -> bool {
        self.roles
            .iter()
            .any(|role| self.config.allows(role, permission))
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// The exact logical negation of [`is_authorized`]; the two can never
    /// agree.
    ///
    /// [`is_authorized`]: RoleEvaluator::is_authorized
    pub fn is_unauthorized(&self) -> bool {
        !self.authorized
    }

    /// add_role
    ///
    /// Grants a role and marks the request authorized. The flag is set
    /// unconditionally, even when the role is already held. A name already
    /// present is not re-added.
    pub fn add_role(&mut self, role: impl Into<String>) {
        self.authorized = true;
        let role = role.into();
        if !self.is(&role) {
            self.roles.push(role);
        }
    }

    /// add_roles
    ///
    /// Grants every listed role, deduplicating each element independently.
    /// Marks the request authorized even when the list is empty.
    pub fn add_roles<I>(&mut self, roles: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.authorized = true;
        for role in roles {
            self.add_role(role);
        }
    }

    /// remove_role
    ///
    /// Drops the named role if held; a no-op otherwise. Does not touch the
    /// `authorized` flag.
    pub fn remove_role(&mut self, role: &str) {
        if let Some(index) = self.roles.iter().position(|held| held == role) {
            self.roles.remove(index);
        }
    }

    /// Overwrites the `authorized` flag directly, independent of held roles.
    pub fn set_authorized(&mut self, authorized: bool) {
        self.authorized = authorized;
    }

    /// The role names currently held, in grant order.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

/// RoleEvaluator Extractor Implementation
///
/// Lets handlers take the request's evaluator as a function argument for
/// fine-grained checks beyond the route-level guards. The instance is the one
/// the gate's initialization layer attached to the request extensions.
///
/// Rejection: `StatusCode::INTERNAL_SERVER_ERROR` (500) when no evaluator is
/// attached, which means the initialization layer was not installed on the
/// router. That is a wiring mistake in the host, not a client fault.
impl<S> FromRequestParts<S> for RoleEvaluator
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RoleEvaluator>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
