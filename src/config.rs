use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Grants
///
/// The permission set conferred by a single role. The `can` list keeps the
/// order in which permissions were declared, matching the configuration
/// document shape `{ "can": ["read", "edit"] }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Grants {
    pub can: Vec<String>,
}

/// RoleConfig
///
/// The shared role → permission mapping. This struct is designed to be
/// immutable once built: the gate wraps it in an `Arc` and every per-request
/// evaluator reads the same instance for the life of the process. There is no
/// reload mechanism.
///
/// A role name absent from the mapping is not an error anywhere in the crate;
/// it simply confers no permissions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RoleConfig {
    roles: HashMap<String, Grants>,
}

impl RoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// role
    ///
    /// Builder-style declaration of a single role and the permissions it
    /// grants. Declaring the same role twice replaces the earlier grant list.
    pub fn role<I>(mut self, name: impl Into<String>, can: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles.insert(
            name.into(),
            Grants {
                can: can.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// from_json
    ///
    /// Parses a role mapping from a JSON document of the shape
    /// `{"admin": {"can": ["read", "edit"]}, "user": {"can": ["read"]}}`.
    /// Intended for hosts that keep the role table in a configuration file;
    /// loading happens once at startup, before traffic.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    /// Returns the grant list configured for a role, if any.
    pub fn grants(&self, role: &str) -> Option<&Grants> {
        self.roles.get(role)
    }

    /// allows
    ///
    /// True iff the named role is configured and its grant list contains the
    /// permission. An unconfigured role degrades silently to "no permission".
    pub fn allows(&self, role: &str, permission: &str) -> bool {
        self.roles
            .get(role)
            .is_some_and(|grants| grants.can.iter().any(|granted| granted == permission))
    }
}

impl From<HashMap<String, Grants>> for RoleConfig {
    fn from(roles: HashMap<String, Grants>) -> Self {
        Self { roles }
    }
}
