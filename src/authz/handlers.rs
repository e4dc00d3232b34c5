use std::sync::Arc;

use async_trait::async_trait;

use super::app_aggregation::AppRoleAggregator;
use super::context::RequestContext;
use super::principal::ActorPolicy;
use super::role_permission::RolePermissionResolver;
use super::roles;
use super::scope_role::ScopeRoleResolver;
use crate::errors::{AppError, AppResult};
use crate::models::permission::PermissionList;
use crate::models::scope::ScopeKind;
use crate::store::MembershipStore;

/// Resolution strategies shared by every handler.
#[derive(Clone)]
pub struct Resolvers {
    pub store: Arc<dyn MembershipStore>,
    pub rules: RolePermissionResolver,
    pub scope_roles: ScopeRoleResolver,
    pub app_roles: AppRoleAggregator,
}

impl Resolvers {
    /// Roles of the actor at the context scope, aggregated across siblings for applications.
    async fn effective_roles(&self, ctx: &RequestContext) -> AppResult<Vec<String>> {
        match ctx.scope {
            ScopeKind::App => self.app_roles.roles(&ctx.user_id, ctx.scope_id).await,
            _ => self.scope_roles.roles(&ctx.user_id, ctx.scope_ref()).await,
        }
    }

    async fn check_with_memberships(&self, ctx: &RequestContext) -> AppResult<bool> {
        let req = ctx.check_request()?;
        let roles = self.effective_roles(ctx).await?;
        self.rules.check(&roles, req).await
    }

    async fn list_with_memberships(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>> {
        let roles = self.effective_roles(ctx).await?;
        self.rules.list(&roles, ctx.scope).await.map(Some)
    }
}

/// One link of the actor classification chain.
///
/// Handlers are consulted in registration order and the first whose
/// `matches` returns true answers the request.
#[async_trait]
pub trait PermissionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn matches(&self, ctx: &RequestContext) -> AppResult<bool>;

    async fn check(&self, ctx: &RequestContext) -> AppResult<bool>;

    /// `Ok(None)` means the handler has nothing to enumerate for this scope.
    async fn permission_list(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>>;
}

/// Internal service accounts bypass every check.
pub struct ServiceAccountHandler {
    policy: ActorPolicy,
}

impl ServiceAccountHandler {
    pub fn new(policy: ActorPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PermissionHandler for ServiceAccountHandler {
    fn name(&self) -> &'static str {
        "service_account"
    }

    async fn matches(&self, ctx: &RequestContext) -> AppResult<bool> {
        Ok(self.policy.is_service_account(&ctx.user_id))
    }

    async fn check(&self, _ctx: &RequestContext) -> AppResult<bool> {
        Ok(true)
    }

    async fn permission_list(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>> {
        Err(AppError::unsupported(format!(
            "permission listing is not available for service account {}",
            ctx.user_id
        )))
    }
}

/// System administrators pass every check; their listing still reflects their own roles below sys.
pub struct SystemAdminHandler {
    resolvers: Resolvers,
}

impl SystemAdminHandler {
    pub fn new(resolvers: Resolvers) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl PermissionHandler for SystemAdminHandler {
    fn name(&self) -> &'static str {
        "system_admin"
    }

    async fn matches(&self, ctx: &RequestContext) -> AppResult<bool> {
        self.resolvers.store.is_system_admin(&ctx.user_id).await
    }

    async fn check(&self, _ctx: &RequestContext) -> AppResult<bool> {
        Ok(true)
    }

    async fn permission_list(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>> {
        if ctx.scope == ScopeKind::Sys {
            return Ok(Some(PermissionList::granted()));
        }
        self.resolvers.list_with_memberships(ctx).await
    }
}

/// The support sentinel acts through one fixed synthetic role.
pub struct SupportHandler {
    policy: ActorPolicy,
    resolvers: Resolvers,
}

impl SupportHandler {
    pub fn new(policy: ActorPolicy, resolvers: Resolvers) -> Self {
        Self { policy, resolvers }
    }

    fn roles() -> Vec<String> {
        vec![roles::SUPPORT.to_string()]
    }
}

#[async_trait]
impl PermissionHandler for SupportHandler {
    fn name(&self) -> &'static str {
        "support"
    }

    async fn matches(&self, ctx: &RequestContext) -> AppResult<bool> {
        Ok(self.policy.is_support(&ctx.user_id))
    }

    async fn check(&self, ctx: &RequestContext) -> AppResult<bool> {
        let req = ctx.check_request()?;
        self.resolvers.rules.check(&Self::roles(), req).await
    }

    async fn permission_list(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>> {
        if ctx.scope == ScopeKind::Sys {
            return Ok(None);
        }
        self.resolvers.rules.list(&Self::roles(), ctx.scope).await.map(Some)
    }
}

/// Everyone else: decisions follow memberships at the scope.
pub struct MemberHandler {
    resolvers: Resolvers,
}

impl MemberHandler {
    pub fn new(resolvers: Resolvers) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl PermissionHandler for MemberHandler {
    fn name(&self) -> &'static str {
        "member"
    }

    async fn matches(&self, _ctx: &RequestContext) -> AppResult<bool> {
        Ok(true)
    }

    async fn check(&self, ctx: &RequestContext) -> AppResult<bool> {
        self.resolvers.check_with_memberships(ctx).await
    }

    async fn permission_list(&self, ctx: &RequestContext) -> AppResult<Option<PermissionList>> {
        self.resolvers.list_with_memberships(ctx).await
    }
}

/// The classification chain in precedence order.
pub fn default_chain(policy: &ActorPolicy, resolvers: &Resolvers) -> Vec<Box<dyn PermissionHandler>> {
    vec![
        Box::new(ServiceAccountHandler::new(policy.clone())),
        Box::new(SystemAdminHandler::new(resolvers.clone())),
        Box::new(SupportHandler::new(policy.clone(), resolvers.clone())),
        Box::new(MemberHandler::new(resolvers.clone())),
    ]
}
