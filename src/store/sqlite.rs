use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::MembershipStore;
use crate::db::row_parsers::{application_from_row, membership_from_row, rule_from_row, scope_info_from_row};
use crate::errors::{AppError, AppResult};
use crate::models::membership::{MembershipRow, ResourceKey};
use crate::models::rule::{RolePermissionRule, RuleKey};
use crate::models::scope::{ApplicationInfo, ScopeInfo, ScopeKind, ScopeRef};

const MEMBER_COLUMNS: &str = "user_id, scope_type, scope_id, parent_id, resource_key, resource_value";
const RULE_COLUMNS: &str = "scope, role, resource_role, resource, action, creator, created_at";

/// `MembershipStore` backed by the platform's SQLite schema.
#[derive(Debug, Clone)]
pub struct SqliteMembershipStore {
    pool: SqlitePool,
}

impl SqliteMembershipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_id(id: u64) -> AppResult<i64> {
    i64::try_from(id).map_err(|_| AppError::bad_request(format!("id out of range: {id}")))
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn memberships(&self, user_id: &str, scope: ScopeRef) -> AppResult<Vec<MembershipRow>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE user_id = ? AND scope_type = ? AND scope_id = ? ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(scope.kind.as_str())
            .bind(db_id(scope.id)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(membership_from_row).collect()
    }

    async fn memberships_by_parent(
        &self,
        kind: ScopeKind,
        parent_id: u64,
        user_id: &str,
    ) -> AppResult<Vec<MembershipRow>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE scope_type = ? AND parent_id = ? AND user_id = ? ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(db_id(parent_id)?)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(membership_from_row).collect()
    }

    async fn is_system_admin(&self, user_id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM members WHERE scope_type = ? AND user_id = ? AND resource_key = ?",
        )
        .bind(ScopeKind::Sys.as_str())
        .bind(user_id)
        .bind(ResourceKey::Role.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn scope_info(&self, scope: ScopeRef) -> AppResult<Option<ScopeInfo>> {
        let sql = match scope.kind {
            ScopeKind::Sys => return Ok(None),
            ScopeKind::Org => "SELECT is_public, 0 AS parent_id FROM organizations WHERE id = ?",
            ScopeKind::Project => "SELECT is_public, org_id AS parent_id FROM projects WHERE id = ?",
            ScopeKind::App => "SELECT is_public, project_id AS parent_id FROM applications WHERE id = ?",
        };
        let row = sqlx::query(sql)
            .bind(db_id(scope.id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(scope_info_from_row).transpose()
    }

    async fn application(&self, app_id: u64) -> AppResult<Option<ApplicationInfo>> {
        let row = sqlx::query("SELECT id, project_id, mode FROM applications WHERE id = ?")
            .bind(db_id(app_id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    async fn applications_by_mode(&self, project_id: u64, mode: &str) -> AppResult<Vec<ApplicationInfo>> {
        let rows = sqlx::query("SELECT id, project_id, mode FROM applications WHERE project_id = ? AND mode = ? ORDER BY id")
            .bind(db_id(project_id)?)
            .bind(mode)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(application_from_row).collect()
    }

    async fn rules_for_roles(&self, roles: &[String]) -> AppResult<Vec<RolePermissionRule>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        // Stored role columns are comma separated, so matching happens after the fetch.
        let sql = format!("SELECT {RULE_COLUMNS} FROM role_permissions WHERE role != '' ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            let rule = rule_from_row(row)?;
            if rule.grants_any_role(roles) {
                rules.push(rule);
            }
        }
        Ok(rules)
    }

    async fn rules_with_resource_role(&self) -> AppResult<Vec<RolePermissionRule>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM role_permissions WHERE TRIM(resource_role) != '' ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn rule_keys(&self, scope: ScopeKind) -> AppResult<Vec<RuleKey>> {
        let rows = sqlx::query("SELECT DISTINCT resource, action FROM role_permissions WHERE scope = ? ORDER BY resource, action")
            .bind(scope.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<RuleKey> {
                let resource: String = row.try_get("resource")?;
                let action: String = row.try_get("action")?;
                Ok(RuleKey::new(scope, resource, action))
            })
            .collect()
    }

    async fn rules_for_key(
        &self,
        scope: ScopeKind,
        resource: &str,
        action: &str,
    ) -> AppResult<Vec<RolePermissionRule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM role_permissions WHERE scope = ? AND resource = ? AND action = ? ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(scope.as_str())
            .bind(resource)
            .bind(action)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(rule_from_row).collect()
    }
}
