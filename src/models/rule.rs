use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::scope::ScopeKind;
use crate::utils::{csv_intersects, csv_overlaps};

/// Where a rule was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrigin {
    Database,
    Static,
}

/// Identity of a rule for merge purposes: a database rule replaces a static one with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub scope: ScopeKind,
    pub resource: String,
    pub action: String,
}

impl RuleKey {
    pub fn new(scope: ScopeKind, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            scope,
            resource: resource.into(),
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionRule {
    pub scope: ScopeKind,
    /// Comma separated role names.
    pub role: String,
    /// Comma separated resource roles; empty when the rule is role-only.
    pub resource_role: String,
    pub resource: String,
    pub action: String,
    pub creator: String,
    pub origin: RuleOrigin,
    pub created_at: Option<DateTime<Utc>>,
}

impl RolePermissionRule {
    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.scope, self.resource.clone(), self.action.clone())
    }

    pub fn grants_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        csv_intersects(&self.role, roles)
    }

    pub fn has_resource_role(&self) -> bool {
        !self.resource_role.trim().is_empty()
    }

    /// True when the rule's resource roles share a token with `requested`.
    pub fn matches_resource_role(&self, requested: Option<&str>) -> bool {
        match requested {
            Some(requested) => csv_overlaps(&self.resource_role, requested),
            None => false,
        }
    }

    /// Role match or resource-role match, the boolean check's matching rule.
    pub fn permits<S: AsRef<str>>(&self, roles: &[S], requested_resource_role: Option<&str>) -> bool {
        self.grants_any_role(roles) || self.matches_resource_role(requested_resource_role)
    }
}
