mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use common::{setup_db, static_rule};
use scope_authz::authz::{roles, RolePermissionResolver, ScopeRoleResolver, StaticPermissionTable};
use scope_authz::config::AuthzConfig;
use scope_authz::errors::{AppError, AppResult};
use scope_authz::models::membership::MembershipRow;
use scope_authz::models::permission::{PermissionCheckRequest, PermissionList};
use scope_authz::models::rule::{RolePermissionRule, RuleKey};
use scope_authz::models::scope::{ApplicationInfo, ScopeInfo, ScopeKind, ScopeRef};
use scope_authz::store::{MembershipStore, SqliteMembershipStore};
use scope_authz::{PermissionEngine, PermissionEvaluator};

#[tokio::test]
async fn service_accounts_pass_every_check() -> Result<()> {
    let db = setup_db().await?;
    let engine = db.engine(Vec::new());

    for user in ["1001", "2500", "4999"] {
        for scope in [ScopeRef::sys(), ScopeRef::org(1), ScopeRef::project(9), ScopeRef::app(77)] {
            let req = PermissionCheckRequest::new(user, scope, "anything", "DELETE");
            assert!(engine.check_permission(&req).await?, "{user} denied at {scope}");
        }
    }

    // Band edges and the support sentinel are not service accounts.
    for user in ["1000", "5000", "2"] {
        let req = PermissionCheckRequest::new(user, ScopeRef::org(1), "anything", "DELETE");
        assert!(!engine.check_permission(&req).await?, "{user} allowed");
    }
    Ok(())
}

#[tokio::test]
async fn system_admin_passes_without_memberships() -> Result<()> {
    let db = setup_db().await?;
    db.member("10001", ScopeRef::sys(), 0, "Admin").await?;
    let engine = db.engine(Vec::new());

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "app", "DELETE");
    assert!(engine.check_permission(&req).await?);

    let req = PermissionCheckRequest::new("10002", ScopeRef::project(42), "app", "DELETE");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn sys_label_does_not_make_an_admin() -> Result<()> {
    let db = setup_db().await?;
    db.label("10001", ScopeRef::sys(), 0, "Admin").await?;
    let engine = db.engine(Vec::new());

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "app", "DELETE");
    assert!(!engine.check_permission(&req).await?);
    assert_eq!(engine.permission_list("10001", ScopeRef::sys()).await?, PermissionList::denied());
    Ok(())
}

#[tokio::test]
async fn support_decides_like_the_support_role() -> Result<()> {
    let db = setup_db().await?;
    db.project(42, 1, false).await?;
    let rules = vec![
        static_rule(ScopeKind::Project, "Owner,Support", "", "project", "GET"),
        static_rule(ScopeKind::Project, "Owner", "", "project", "DELETE"),
    ];
    db.rule(ScopeKind::Project, "Support", "", "issue", "GET").await?;
    let engine = db.engine(rules.clone());
    let resolver = RolePermissionResolver::new(db.store(), Arc::new(StaticPermissionTable::from_rules(rules)));
    let support_roles = vec![roles::SUPPORT.to_string()];

    for (resource, action) in [("project", "GET"), ("project", "DELETE"), ("issue", "GET"), ("issue", "DELETE")] {
        let req = PermissionCheckRequest::new("2", ScopeRef::project(42), resource, action);
        assert_eq!(
            engine.check_permission(&req).await?,
            resolver.check(&support_roles, &req).await?,
            "{resource}/{action}"
        );
    }

    let req = PermissionCheckRequest::new("2", ScopeRef::project(42), "project", "GET");
    assert!(engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn database_rule_hides_static_rule_with_same_key() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(42, 1, false).await?;
    db.member("10001", ScopeRef::project(42), 1, "Lead").await?;
    let engine = db.engine(vec![static_rule(ScopeKind::Project, "Owner,Lead", "", "app", "delete")]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "app", "delete");
    assert!(engine.check_permission(&req).await?);

    db.rule(ScopeKind::Project, "Viewer", "", "app", "delete").await?;
    assert!(!engine.check_permission(&req).await?);

    // Other keys keep their static entries.
    let engine = db.engine(vec![
        static_rule(ScopeKind::Project, "Owner,Lead", "", "app", "delete"),
        static_rule(ScopeKind::Project, "Lead", "", "app", "create"),
    ]);
    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "app", "create");
    assert!(engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn public_scope_grants_a_single_guest_role() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(42, 1, true).await?;
    let engine = db.engine(vec![
        static_rule(ScopeKind::Project, "Guest,Dev", "", "project", "GET"),
        static_rule(ScopeKind::Project, "Dev", "", "issue", "CREATE"),
    ]);

    let scope_roles = ScopeRoleResolver::new(db.store());
    assert_eq!(scope_roles.roles("10001", ScopeRef::project(42)).await?, vec!["Guest".to_string()]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "project", "GET");
    assert!(engine.check_permission(&req).await?);
    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "issue", "CREATE");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn private_scope_without_containment_has_no_roles() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(42, 1, false).await?;
    db.member("10001", ScopeRef::org(2), 0, "Dev").await?;
    let engine = db.engine(vec![static_rule(ScopeKind::Project, "Guest", "", "project", "GET")]);

    let scope_roles = ScopeRoleResolver::new(db.store());
    assert!(scope_roles.roles("10001", ScopeRef::project(42)).await?.is_empty());
    assert!(!engine.check_public_scope("10001", ScopeRef::project(42)).await?);

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "project", "GET");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn containing_membership_yields_guest() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(42, 1, false).await?;
    db.app(7, 42, "SERVICE").await?;
    db.member("org-member", ScopeRef::org(1), 0, "Dev").await?;
    db.member("app-member", ScopeRef::app(7), 42, "Developer").await?;

    let engine = db.engine(Vec::new());
    let scope_roles = ScopeRoleResolver::new(db.store());

    // Membership on the parent organization.
    assert!(engine.check_public_scope("org-member", ScopeRef::project(42)).await?);
    assert_eq!(scope_roles.roles("org-member", ScopeRef::project(42)).await?, vec!["Guest".to_string()]);
    // Two hops: app -> project -> org.
    assert!(engine.check_public_scope("org-member", ScopeRef::app(7)).await?);
    // Membership on a child application.
    assert!(engine.check_public_scope("app-member", ScopeRef::project(42)).await?);
    // Nothing above the organization.
    assert!(!engine.check_public_scope("app-member", ScopeRef::org(1)).await?);
    assert!(!engine.check_public_scope("org-member", ScopeRef::sys()).await?);
    Ok(())
}

#[tokio::test]
async fn sys_scope_has_no_guest_fallback() -> Result<()> {
    let db = setup_db().await?;
    let engine = db.engine(vec![static_rule(ScopeKind::Sys, "Guest", "", "org", "LIST")]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::sys(), "org", "LIST");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn labels_are_not_roles() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.label("10001", ScopeRef::org(1), 0, "Manager").await?;
    let engine = db.engine(vec![static_rule(ScopeKind::Org, "Manager", "", "project", "CREATE")]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::org(1), "project", "CREATE");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn sibling_project_service_roles_count_on_target_app() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(9, 1, false).await?;
    db.app(1, 9, "PROJECT_SERVICE").await?;
    db.app(2, 9, "PROJECT_SERVICE").await?;
    db.app(3, 9, "SERVICE").await?;
    db.app(4, 9, "SERVICE").await?;
    db.member("10001", ScopeRef::app(2), 9, "Developer").await?;
    db.member("10001", ScopeRef::app(4), 9, "Developer").await?;
    db.rule(ScopeKind::App, "Developer", "", "pipeline", "OPERATE").await?;
    let engine = db.engine(Vec::new());

    let req = PermissionCheckRequest::new("10001", ScopeRef::app(1), "pipeline", "OPERATE");
    assert!(engine.check_permission(&req).await?);

    // Plain service apps do not share roles.
    let req = PermissionCheckRequest::new("10001", ScopeRef::app(3), "pipeline", "OPERATE");
    assert!(!engine.check_permission(&req).await?);
    Ok(())
}

#[tokio::test]
async fn resource_role_grants_without_role_match() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(42, 1, false).await?;
    db.member("10001", ScopeRef::project(42), 1, "Dev").await?;
    let engine = db.engine(vec![static_rule(ScopeKind::Project, "Owner,Lead", "Creator,Assignee", "issue", "UPDATE")]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "issue", "UPDATE");
    assert!(!engine.check_permission(&req).await?);
    assert!(engine.check_permission(&req.clone().with_resource_role(" Assignee")).await?);
    assert!(!engine.check_permission(&req.clone().with_resource_role("Watcher")).await?);

    // Resource roles are bound to the rule's own resource and action.
    let other = PermissionCheckRequest::new("10001", ScopeRef::project(42), "issue", "DELETE").with_resource_role("Creator");
    assert!(!engine.check_permission(&other).await?);
    Ok(())
}

#[tokio::test]
async fn repeated_checks_are_stable() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(9, 1, false).await?;
    db.app(1, 9, "PROJECT_SERVICE").await?;
    db.app(2, 9, "PROJECT_SERVICE").await?;
    db.member("10001", ScopeRef::app(2), 9, "Developer").await?;
    let engine = db.engine(vec![static_rule(ScopeKind::App, "Developer", "", "app", "GET")]);

    let req = PermissionCheckRequest::new("10001", ScopeRef::app(1), "app", "GET");
    let first = engine.check_permission(&req).await?;
    let first_list = engine.permission_list("10001", ScopeRef::app(1)).await?;
    for _ in 0..3 {
        assert_eq!(engine.check_permission(&req).await?, first);
        assert_eq!(engine.permission_list("10001", ScopeRef::app(1)).await?, first_list);
    }
    Ok(())
}

#[tokio::test]
async fn store_failure_is_reported_not_denied() -> Result<()> {
    let db = setup_db().await?;
    let engine = db.engine(Vec::new());
    db.pool.close().await;

    let req = PermissionCheckRequest::new("10001", ScopeRef::project(42), "app", "GET");
    let err = engine.check_permission(&req).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "unexpected error: {err:?}");
    assert!(!engine.is_allowed(&req).await);

    // Service accounts are classified before any lookup.
    let req = PermissionCheckRequest::new("1500", ScopeRef::project(42), "app", "GET");
    assert!(engine.check_permission(&req).await?);
    Ok(())
}

/// Delegates to SQLite but fails or stalls membership lookups on chosen applications.
struct FlakyStore {
    inner: SqliteMembershipStore,
    failing_app: u64,
    stalled_app: u64,
}

#[async_trait]
impl MembershipStore for FlakyStore {
    async fn memberships(&self, user_id: &str, scope: ScopeRef) -> AppResult<Vec<MembershipRow>> {
        if scope == ScopeRef::app(self.failing_app) {
            return Err(AppError::internal("membership backend unavailable"));
        }
        if scope == ScopeRef::app(self.stalled_app) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.inner.memberships(user_id, scope).await
    }
    async fn memberships_by_parent(&self, kind: ScopeKind, parent_id: u64, user_id: &str) -> AppResult<Vec<MembershipRow>> {
        self.inner.memberships_by_parent(kind, parent_id, user_id).await
    }
    async fn is_system_admin(&self, user_id: &str) -> AppResult<bool> {
        self.inner.is_system_admin(user_id).await
    }
    async fn scope_info(&self, scope: ScopeRef) -> AppResult<Option<ScopeInfo>> {
        self.inner.scope_info(scope).await
    }
    async fn application(&self, app_id: u64) -> AppResult<Option<ApplicationInfo>> {
        self.inner.application(app_id).await
    }
    async fn applications_by_mode(&self, project_id: u64, mode: &str) -> AppResult<Vec<ApplicationInfo>> {
        self.inner.applications_by_mode(project_id, mode).await
    }
    async fn rules_for_roles(&self, roles: &[String]) -> AppResult<Vec<RolePermissionRule>> {
        self.inner.rules_for_roles(roles).await
    }
    async fn rules_with_resource_role(&self) -> AppResult<Vec<RolePermissionRule>> {
        self.inner.rules_with_resource_role().await
    }
    async fn rule_keys(&self, scope: ScopeKind) -> AppResult<Vec<RuleKey>> {
        self.inner.rule_keys(scope).await
    }
    async fn rules_for_key(&self, scope: ScopeKind, resource: &str, action: &str) -> AppResult<Vec<RolePermissionRule>> {
        self.inner.rules_for_key(scope, resource, action).await
    }
}

#[tokio::test]
async fn failing_and_stalled_siblings_contribute_nothing() -> Result<()> {
    let db = setup_db().await?;
    db.org(1, false).await?;
    db.project(9, 1, false).await?;
    for app in 1..=4 {
        db.app(app, 9, "PROJECT_SERVICE").await?;
    }
    db.member("10001", ScopeRef::app(2), 9, "Owner").await?;
    db.member("10001", ScopeRef::app(3), 9, "Lead").await?;
    db.member("10001", ScopeRef::app(4), 9, "Developer").await?;

    let store: Arc<dyn MembershipStore> = Arc::new(FlakyStore {
        inner: SqliteMembershipStore::new(db.pool.clone()),
        failing_app: 2,
        stalled_app: 3,
    });
    let config = AuthzConfig {
        sibling_timeout: Duration::from_millis(50),
        ..AuthzConfig::default()
    };
    let rules = vec![
        static_rule(ScopeKind::App, "Developer", "", "pipeline", "OPERATE"),
        static_rule(ScopeKind::App, "Owner", "", "app", "DELETE"),
        static_rule(ScopeKind::App, "Lead", "", "app", "UPDATE"),
    ];
    let engine = PermissionEngine::new(store, Arc::new(StaticPermissionTable::from_rules(rules)), &config);

    let req = PermissionCheckRequest::new("10001", ScopeRef::app(1), "pipeline", "OPERATE");
    assert!(engine.check_permission(&req).await?);
    let req = PermissionCheckRequest::new("10001", ScopeRef::app(1), "app", "DELETE");
    assert!(!engine.check_permission(&req).await?);
    let req = PermissionCheckRequest::new("10001", ScopeRef::app(1), "app", "UPDATE");
    assert!(!engine.check_permission(&req).await?);

    let list = engine.permission_list("10001", ScopeRef::app(1)).await?;
    assert_eq!(list.roles, vec!["Developer".to_string()]);
    Ok(())
}
