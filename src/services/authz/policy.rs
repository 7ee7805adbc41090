//! Role -> permission grants.
//!
//! A grant is a `(resource, action)` pair written `resource:action`. `*` in
//! either position matches anything, but only where a policy states it
//! literally. Anything not granted is denied.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid grant '{0}' (expected resource:action)")]
    InvalidGrant(String),
}

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub resource: String,
    pub action: String,
}

impl Grant {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s.trim().split_once(':') {
            Some((resource, action))
                if !resource.is_empty() && !action.is_empty() && !action.contains(':') =>
            {
                Ok(Self::new(resource, action))
            }
            _ => Err(PolicyError::InvalidGrant(s.to_string())),
        }
    }

    fn matches(&self, resource: &str, action: &str) -> bool {
        (self.resource == WILDCARD || self.resource == resource)
            && (self.action == WILDCARD || self.action == action)
    }
}

impl std::fmt::Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    roles: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionPolicy {
    grants: HashMap<Role, HashSet<Grant>>,
}

impl PermissionPolicy {
    /// An empty policy: every permission check is denied.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in grants for `super_admin`, `tenant_admin` and `member`.
    pub fn builtin() -> Self {
        Self::empty()
            .grant(Role::SUPER_ADMIN, Grant::new(WILDCARD, WILDCARD))
            .grant(Role::TENANT_ADMIN, Grant::new("users", "read"))
            .grant(Role::TENANT_ADMIN, Grant::new("users", "write"))
            .grant(Role::TENANT_ADMIN, Grant::new("sessions", "read"))
            .grant(Role::TENANT_ADMIN, Grant::new("sessions", "revoke_any"))
            .grant(Role::TENANT_ADMIN, Grant::new("orders", "read"))
            .grant(Role::TENANT_ADMIN, Grant::new("orders", "write"))
            .grant(Role::MEMBER, Grant::new("sessions", "read"))
            .grant(Role::MEMBER, Grant::new("orders", "read"))
            .grant(Role::MEMBER, Grant::new("profile", "read"))
            .grant(Role::MEMBER, Grant::new("profile", "write"))
    }

    /// `{"roles": {"member": ["orders:read", "profile:*"]}}`
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_json::from_str(json)?;
        let mut policy = Self::empty();
        for (role, grants) in file.roles {
            let role = Role::from(role);
            // A role listed with no grants is known but allowed nothing.
            policy.grants.entry(role.clone()).or_default();
            for grant in grants {
                policy = policy.grant(role.clone(), Grant::parse(&grant)?);
            }
        }
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn grant(mut self, role: Role, grant: Grant) -> Self {
        self.grants.entry(role).or_default().insert(grant);
        self
    }

    pub fn allows(&self, role: &Role, resource: &str, action: &str) -> bool {
        self.grants
            .get(role)
            .is_some_and(|grants| grants.iter().any(|g| g.matches(resource, action)))
    }
}
