#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use scope_authz::authz::StaticPermissionTable;
use scope_authz::config::AuthzConfig;
use scope_authz::models::rule::{RolePermissionRule, RuleOrigin};
use scope_authz::models::scope::{ScopeKind, ScopeRef};
use scope_authz::store::{MembershipStore, SqliteMembershipStore};
use scope_authz::PermissionEngine;

/// Temp-file database with migrations applied; the directory lives as long as this value.
pub struct TestDb {
    pub dir: TempDir,
    pub pool: SqlitePool,
}

pub async fn setup_db() -> Result<TestDb> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok(TestDb { dir, pool })
}

impl TestDb {
    pub fn store(&self) -> Arc<dyn MembershipStore> {
        Arc::new(SqliteMembershipStore::new(self.pool.clone()))
    }

    pub fn engine(&self, rules: Vec<RolePermissionRule>) -> PermissionEngine {
        PermissionEngine::new(
            self.store(),
            Arc::new(StaticPermissionTable::from_rules(rules)),
            &AuthzConfig::default(),
        )
    }

    pub async fn org(&self, id: u64, public: bool) -> Result<()> {
        sqlx::query("INSERT INTO organizations (id, name, is_public) VALUES (?, ?, ?)")
            .bind(id as i64)
            .bind(format!("org-{id}"))
            .bind(public)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn project(&self, id: u64, org_id: u64, public: bool) -> Result<()> {
        sqlx::query("INSERT INTO projects (id, org_id, name, is_public) VALUES (?, ?, ?, ?)")
            .bind(id as i64)
            .bind(org_id as i64)
            .bind(format!("project-{id}"))
            .bind(public)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn app(&self, id: u64, project_id: u64, mode: &str) -> Result<()> {
        sqlx::query("INSERT INTO applications (id, project_id, name, mode, is_public) VALUES (?, ?, ?, ?, 0)")
            .bind(id as i64)
            .bind(project_id as i64)
            .bind(format!("app-{id}"))
            .bind(mode)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn member(&self, user_id: &str, scope: ScopeRef, parent_id: u64, role: &str) -> Result<()> {
        self.member_row(user_id, scope, parent_id, "role", role).await
    }

    pub async fn label(&self, user_id: &str, scope: ScopeRef, parent_id: u64, label: &str) -> Result<()> {
        self.member_row(user_id, scope, parent_id, "label", label).await
    }

    async fn member_row(&self, user_id: &str, scope: ScopeRef, parent_id: u64, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO members (user_id, scope_type, scope_id, parent_id, resource_key, resource_value) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(scope.kind.as_str())
        .bind(scope.id as i64)
        .bind(parent_id as i64)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn rule(&self, scope: ScopeKind, role: &str, resource_role: &str, resource: &str, action: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_permissions (scope, role, resource_role, resource, action, creator) VALUES (?, ?, ?, ?, ?, 'test')",
        )
        .bind(scope.as_str())
        .bind(role)
        .bind(resource_role)
        .bind(resource)
        .bind(action)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub fn static_rule(scope: ScopeKind, role: &str, resource_role: &str, resource: &str, action: &str) -> RolePermissionRule {
    RolePermissionRule {
        scope,
        role: role.to_string(),
        resource_role: resource_role.to_string(),
        resource: resource.to_string(),
        action: action.to_string(),
        creator: String::new(),
        origin: RuleOrigin::Static,
        created_at: None,
    }
}
