use crate::errors::{AppError, AppResult};
use crate::models::permission::PermissionCheckRequest;
use crate::models::scope::{ScopeKind, ScopeRef};

/// Immutable per-call input handed to every permission handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub scope: ScopeKind,
    pub scope_id: u64,
    /// Present for boolean checks, absent for enumeration.
    pub request: Option<PermissionCheckRequest>,
}

impl RequestContext {
    pub fn for_check(request: PermissionCheckRequest) -> Self {
        let scope = request.scope_ref();
        Self {
            user_id: request.user_id.clone(),
            scope: scope.kind,
            scope_id: scope.id,
            request: Some(request),
        }
    }

    pub fn for_list(user_id: impl Into<String>, scope: ScopeRef) -> Self {
        Self {
            user_id: user_id.into(),
            scope: scope.kind,
            scope_id: scope.id,
            request: None,
        }
    }

    pub fn scope_ref(&self) -> ScopeRef {
        ScopeRef::new(self.scope, self.scope_id)
    }

    pub fn check_request(&self) -> AppResult<&PermissionCheckRequest> {
        self.request
            .as_ref()
            .ok_or_else(|| AppError::internal("permission check invoked without a request"))
    }
}
