use std::sync::Arc;

use super::roles;
use crate::errors::AppResult;
use crate::models::membership::roles_of;
use crate::models::scope::{ScopeKind, ScopeRef};
use crate::store::MembershipStore;

/// Turns memberships at one scope into an effective role set.
#[derive(Clone)]
pub struct ScopeRoleResolver {
    store: Arc<dyn MembershipStore>,
}

impl ScopeRoleResolver {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Roles held at `scope`, or a lone Guest role when the scope is visible to
    /// the actor without a direct membership.
    pub async fn roles(&self, user_id: &str, scope: ScopeRef) -> AppResult<Vec<String>> {
        let rows = self.store.memberships(user_id, scope).await?;
        if !rows.is_empty() {
            return Ok(roles_of(&rows));
        }

        if scope.kind == ScopeKind::Sys {
            return Ok(Vec::new());
        }

        if self.is_public_or_contained(user_id, scope).await? {
            tracing::debug!(user_id, scope = %scope, "implicit guest role");
            return Ok(vec![roles::GUEST.to_string()]);
        }

        Ok(Vec::new())
    }

    /// True when `scope` is public, when the actor belongs to one of its
    /// direct children, or when the actor belongs to any scope containing it.
    pub async fn is_public_or_contained(&self, user_id: &str, scope: ScopeRef) -> AppResult<bool> {
        if scope.kind == ScopeKind::Sys {
            return Ok(false);
        }

        let Some(info) = self.store.scope_info(scope).await? else {
            tracing::debug!(user_id, scope = %scope, "scope not found");
            return Ok(false);
        };
        if info.is_public {
            return Ok(true);
        }

        if let Some(child) = scope.kind.child() {
            let below = self.store.memberships_by_parent(child, scope.id, user_id).await?;
            if !below.is_empty() {
                return Ok(true);
            }
        }

        // At most app -> project -> org.
        let mut kind = scope.kind;
        let mut parent_id = info.parent_id;
        while let Some(parent_kind) = kind.parent() {
            let parent = ScopeRef::new(parent_kind, parent_id);
            if !self.store.memberships(user_id, parent).await?.is_empty() {
                return Ok(true);
            }
            match self.store.scope_info(parent).await? {
                Some(parent_info) => parent_id = parent_info.parent_id,
                None => return Ok(false),
            }
            kind = parent_kind;
        }

        Ok(false)
    }
}
