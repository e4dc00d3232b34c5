use std::sync::Arc;

use async_trait::async_trait;

use super::app_aggregation::AppRoleAggregator;
use super::context::RequestContext;
use super::handlers::{default_chain, PermissionHandler, Resolvers};
use super::principal::ActorPolicy;
use super::role_permission::RolePermissionResolver;
use super::scope_role::ScopeRoleResolver;
use super::static_table::StaticPermissionTable;
use crate::config::AuthzConfig;
use crate::errors::{AppError, AppResult};
use crate::models::permission::{PermissionCheckRequest, PermissionList};
use crate::models::scope::ScopeRef;
use crate::store::MembershipStore;

/// Entry point for authorization decisions.
#[async_trait]
pub trait PermissionEvaluator: Send + Sync {
    /// Whether the request is allowed. `Err` means no decision could be made.
    async fn check_permission(&self, req: &PermissionCheckRequest) -> AppResult<bool>;

    /// What the actor may do at `scope`.
    async fn permission_list(&self, user_id: &str, scope: ScopeRef) -> AppResult<PermissionList>;

    /// Whether `scope` is visible to the actor without a direct membership.
    async fn check_public_scope(&self, user_id: &str, scope: ScopeRef) -> AppResult<bool>;
}

/// Default evaluator: classifies the actor, then resolves through the matching strategy.
///
/// Classification order:
/// 1. internal service account -> allow
/// 2. system admin -> allow
/// 3. support sentinel -> fixed support role
/// 4. everyone else -> memberships at the scope
pub struct PermissionEngine {
    handlers: Vec<Box<dyn PermissionHandler>>,
    scope_roles: ScopeRoleResolver,
}

impl PermissionEngine {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        table: Arc<StaticPermissionTable>,
        config: &AuthzConfig,
    ) -> Self {
        let scope_roles = ScopeRoleResolver::new(Arc::clone(&store));
        let resolvers = Resolvers {
            rules: RolePermissionResolver::new(Arc::clone(&store), table),
            app_roles: AppRoleAggregator::new(
                Arc::clone(&store),
                scope_roles.clone(),
                config.sibling_fanout_limit,
                config.sibling_timeout,
            ),
            scope_roles: scope_roles.clone(),
            store,
        };
        let handlers = default_chain(&ActorPolicy::from_config(config), &resolvers);

        Self { handlers, scope_roles }
    }

    async fn classify(&self, ctx: &RequestContext) -> AppResult<&dyn PermissionHandler> {
        for handler in &self.handlers {
            if handler.matches(ctx).await? {
                tracing::debug!(
                    user_id = %ctx.user_id,
                    scope = %ctx.scope,
                    scope_id = ctx.scope_id,
                    handler = handler.name(),
                    "actor classified"
                );
                return Ok(handler.as_ref());
            }
        }
        Err(AppError::unclassified(ctx.user_id.clone()))
    }

    /// Fail-closed variant of `check_permission`: errors deny.
    pub async fn is_allowed(&self, req: &PermissionCheckRequest) -> bool {
        match self.check_permission(req).await {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(user_id = %req.user_id, error = %err, "permission check failed, denying");
                false
            }
        }
    }

    /// Fail-closed variant of `permission_list`: errors yield the denied list.
    pub async fn permission_list_or_deny(&self, user_id: &str, scope: ScopeRef) -> PermissionList {
        match self.permission_list(user_id, scope).await {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(user_id, scope = %scope, error = %err, "permission listing failed, denying");
                PermissionList::denied()
            }
        }
    }
}

#[async_trait]
impl PermissionEvaluator for PermissionEngine {
    async fn check_permission(&self, req: &PermissionCheckRequest) -> AppResult<bool> {
        let ctx = RequestContext::for_check(req.clone());
        let handler = self.classify(&ctx).await?;
        let allowed = handler.check(&ctx).await?;

        tracing::debug!(
            user_id = %req.user_id,
            scope = %req.scope,
            scope_id = req.scope_id,
            resource = %req.resource,
            action = %req.action,
            handler = handler.name(),
            allowed,
            "permission checked"
        );
        Ok(allowed)
    }

    async fn permission_list(&self, user_id: &str, scope: ScopeRef) -> AppResult<PermissionList> {
        let ctx = RequestContext::for_list(user_id, scope);
        let handler = self.classify(&ctx).await?;
        let list = handler.permission_list(&ctx).await?;
        Ok(list.unwrap_or_else(PermissionList::denied))
    }

    async fn check_public_scope(&self, user_id: &str, scope: ScopeRef) -> AppResult<bool> {
        self.scope_roles.is_public_or_contained(user_id, scope).await
    }
}

#[cfg(test)]
impl PermissionEngine {
    fn with_handlers(handlers: Vec<Box<dyn PermissionHandler>>, scope_roles: ScopeRoleResolver) -> Self {
        Self { handlers, scope_roles }
    }
}
