use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::scope::{ScopeKind, ScopeRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionCheckRequest {
    #[schema(example = "10001")]
    pub user_id: String,
    #[schema(example = "project")]
    pub scope: ScopeKind,
    #[serde(default)]
    #[schema(example = 42)]
    pub scope_id: u64,
    #[schema(example = "app")]
    pub resource: String,
    #[schema(example = "DELETE")]
    pub action: String,
    /// Comma separated instance-level roles the caller holds on the resource, e.g. "Creator,Assignee".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Creator")]
    pub resource_role: Option<String>,
}

impl PermissionCheckRequest {
    pub fn new(
        user_id: impl Into<String>,
        scope: ScopeRef,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            scope: scope.kind,
            scope_id: scope.id,
            resource: resource.into(),
            action: action.into(),
            resource_role: None,
        }
    }

    pub fn with_resource_role(mut self, resource_role: impl Into<String>) -> Self {
        self.resource_role = Some(resource_role.into());
        self
    }

    pub fn scope_ref(&self) -> ScopeRef {
        ScopeRef::new(self.scope, self.scope_id)
    }

    /// Requested resource roles, `None` when absent or blank.
    pub fn resource_role(&self) -> Option<&str> {
        self.resource_role.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub access: bool,
}

/// A (resource, action) pair the actor may perform, optionally gated on a resource role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct ScopeResource {
    pub resource: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionList {
    pub access: bool,
    pub roles: Vec<String>,
    pub permission_list: Vec<ScopeResource>,
    pub resource_role_list: Vec<ScopeResource>,
    pub exist: bool,
}

impl PermissionList {
    /// The answer for actors with no grant at the scope.
    pub fn denied() -> Self {
        Self {
            access: false,
            roles: Vec::new(),
            permission_list: Vec::new(),
            resource_role_list: Vec::new(),
            exist: true,
        }
    }

    /// Full access without enumerated rules (system administrators at sys scope).
    pub fn granted() -> Self {
        Self {
            access: true,
            ..Self::denied()
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScopeQuery {
    pub scope: ScopeKind,
    #[serde(default)]
    pub scope_id: u64,
}

impl ScopeQuery {
    pub fn scope_ref(&self) -> ScopeRef {
        ScopeRef::new(self.scope, self.scope_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicScopeResponse {
    pub public: bool,
}
