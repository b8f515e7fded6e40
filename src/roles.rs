//! Operational roles held by the local peer
//!
//! A peer may be configured as an endorser, a committer, a validator, or any
//! combination. An empty role set means the peer holds every role.
use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub const ENDORSER: &str = "endorser";
pub const COMMITTER: &str = "committer";
pub const VALIDATOR: &str = "validator";

#[derive(
    Clone, Debug, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
pub struct Role(String);

impl Role {
    pub fn endorser() -> Self {
        Self(ENDORSER.to_string())
    }

    pub fn committer() -> Self {
        Self(COMMITTER.to_string())
    }

    pub fn validator() -> Self {
        Self(VALIDATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = s.trim().to_lowercase();
        if role.is_empty() {
            return Err("Role must not be empty".to_string());
        }
        if role.chars().any(char::is_whitespace) {
            return Err(format!("Invalid role: {}", s));
        }
        Ok(Role(role))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of roles held by this process.
/// An empty set is universal: every membership query answers true.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// The universal role set
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_roles<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn is_universal(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.is_universal() || self.0.contains(role)
    }

    pub fn is_endorser(&self) -> bool {
        self.contains(&Role::endorser())
    }

    pub fn is_committer(&self) -> bool {
        self.contains(&Role::committer())
    }

    pub fn is_validator(&self) -> bool {
        self.contains(&Role::validator())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

/// Parses a comma-separated role list, e.g. `"endorser,committer"`.
/// Blank input yields the universal set and blank entries are ignored.
impl std::str::FromStr for RoleSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut roles = BTreeSet::new();
        for entry in s.split(',').filter(|entry| !entry.trim().is_empty()) {
            roles.insert(entry.parse::<Role>()?);
        }
        Ok(Self(roles))
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_universal() {
            return write!(f, "all");
        }
        let roles: Vec<&str> = self.0.iter().map(Role::as_str).collect();
        write!(f, "{}", roles.join(","))
    }
}

/// Shared handle to the local role set.
///
/// Readers never block: each query loads the current snapshot. Writers replace
/// the whole set at once, so a reader never observes a partially updated set.
/// Concurrent `set_roles` calls are last-writer-wins.
#[derive(Clone, Debug)]
pub struct RoleRegistry {
    roles: Arc<ArcSwap<RoleSet>>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new(RoleSet::all())
    }
}

impl RoleRegistry {
    pub fn new(roles: RoleSet) -> Self {
        Self {
            roles: Arc::new(ArcSwap::from_pointee(roles)),
        }
    }

    pub fn set_roles(&self, roles: RoleSet) {
        tracing::info!("Setting peer roles to [{}]", roles);
        self.roles.store(Arc::new(roles));
    }

    /// Current snapshot of the role set
    pub fn roles(&self) -> Arc<RoleSet> {
        self.roles.load_full()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.load().contains(role)
    }

    pub fn is_endorser(&self) -> bool {
        self.roles.load().is_endorser()
    }

    pub fn is_committer(&self) -> bool {
        self.roles.load().is_committer()
    }

    pub fn is_validator(&self) -> bool {
        self.roles.load().is_validator()
    }
}
