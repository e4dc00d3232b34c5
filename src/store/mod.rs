//! Read-side access to membership, scope and rule data owned by the platform.

mod sqlite;

pub use sqlite::SqliteMembershipStore;

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::membership::MembershipRow;
use crate::models::rule::{RolePermissionRule, RuleKey};
use crate::models::scope::{ApplicationInfo, ScopeKind, ScopeInfo, ScopeRef};

/// Source of truth for who belongs where and which database rules exist.
///
/// Absence is reported as empty collections or `None`; `Err` is reserved for
/// failures of the backing store.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Membership rows of `user_id` at exactly `scope`.
    async fn memberships(&self, user_id: &str, scope: ScopeRef) -> AppResult<Vec<MembershipRow>>;

    /// Membership rows of `user_id` at scopes of `kind` whose parent is `parent_id`.
    async fn memberships_by_parent(
        &self,
        kind: ScopeKind,
        parent_id: u64,
        user_id: &str,
    ) -> AppResult<Vec<MembershipRow>>;

    async fn is_system_admin(&self, user_id: &str) -> AppResult<bool>;

    /// Visibility metadata for `scope`; `None` for sys or unknown ids.
    async fn scope_info(&self, scope: ScopeRef) -> AppResult<Option<ScopeInfo>>;

    async fn application(&self, app_id: u64) -> AppResult<Option<ApplicationInfo>>;

    async fn applications_by_mode(&self, project_id: u64, mode: &str) -> AppResult<Vec<ApplicationInfo>>;

    /// Database rules whose role list names any of `roles`.
    async fn rules_for_roles(&self, roles: &[String]) -> AppResult<Vec<RolePermissionRule>>;

    /// Database rules carrying a non-empty resource role.
    async fn rules_with_resource_role(&self) -> AppResult<Vec<RolePermissionRule>>;

    /// Distinct (scope, resource, action) keys held by database rules at `scope`.
    async fn rule_keys(&self, scope: ScopeKind) -> AppResult<Vec<RuleKey>>;

    /// Every database rule stored under (scope, resource, action).
    async fn rules_for_key(
        &self,
        scope: ScopeKind,
        resource: &str,
        action: &str,
    ) -> AppResult<Vec<RolePermissionRule>>;
}
