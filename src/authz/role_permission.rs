use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::static_table::StaticPermissionTable;
use crate::errors::AppResult;
use crate::models::permission::{PermissionCheckRequest, PermissionList, ScopeResource};
use crate::models::rule::{RolePermissionRule, RuleKey};
use crate::models::scope::ScopeKind;
use crate::store::MembershipStore;

/// Resolves a role set against database rules layered over the static table.
///
/// For a given (scope, resource, action) a database rule replaces the static
/// entry outright; rules under different keys from both sources coexist.
#[derive(Clone)]
pub struct RolePermissionResolver {
    store: Arc<dyn MembershipStore>,
    table: Arc<StaticPermissionTable>,
}

impl RolePermissionResolver {
    pub fn new(store: Arc<dyn MembershipStore>, table: Arc<StaticPermissionTable>) -> Self {
        Self { store, table }
    }

    /// Every permission `roles` yield at `scope`.
    pub async fn list(&self, roles: &[String], scope: ScopeKind) -> AppResult<PermissionList> {
        if roles.is_empty() {
            return Ok(PermissionList::denied());
        }

        // Static entries under a key held by any database rule are dropped, as in `check`.
        let held: HashSet<RuleKey> = self.store.rule_keys(scope).await?.into_iter().collect();
        let mut merged: BTreeMap<RuleKey, RolePermissionRule> = self
            .table
            .rules_for_roles(scope, roles)
            .into_iter()
            .filter(|(key, _)| !held.contains(key))
            .collect();
        for rule in self.store.rules_for_roles(roles).await? {
            if rule.scope == scope {
                merged.insert(rule.key(), rule);
            }
        }

        let permission_list = merged
            .values()
            .map(|rule| ScopeResource {
                resource: rule.resource.clone(),
                action: rule.action.clone(),
                resource_role: None,
            })
            .collect();

        // Resource-role grants are visible regardless of the caller's roles.
        let mut resource_roles: BTreeSet<ScopeResource> =
            merged.values().filter_map(resource_role_entry).collect();
        for rule in self.store.rules_with_resource_role().await? {
            if rule.scope == scope {
                resource_roles.extend(resource_role_entry(&rule));
            }
        }

        let roles: BTreeSet<String> = roles.iter().cloned().collect();
        Ok(PermissionList {
            access: true,
            roles: roles.into_iter().collect(),
            permission_list,
            resource_role_list: resource_roles.into_iter().collect(),
            exist: true,
        })
    }

    /// Whether `roles` (or the request's resource role) allow the requested action.
    pub async fn check(&self, roles: &[String], req: &PermissionCheckRequest) -> AppResult<bool> {
        if roles.is_empty() {
            return Ok(false);
        }

        let resource_role = req.resource_role();
        let db_rules = self
            .store
            .rules_for_key(req.scope, &req.resource, &req.action)
            .await?;

        if db_rules.iter().any(|rule| rule.permits(roles, resource_role)) {
            tracing::debug!(
                user_id = %req.user_id,
                resource = %req.resource,
                action = %req.action,
                "database rule match"
            );
            return Ok(true);
        }

        if !db_rules.is_empty() {
            // The key is owned by the database; the static entry is shadowed.
            return Ok(false);
        }

        let key = RuleKey::new(req.scope, req.resource.clone(), req.action.clone());
        let allowed = self
            .table
            .get(&key)
            .map(|rule| rule.permits(roles, resource_role))
            .unwrap_or(false);

        tracing::debug!(
            user_id = %req.user_id,
            resource = %req.resource,
            action = %req.action,
            allowed,
            "static rule lookup"
        );
        Ok(allowed)
    }
}

fn resource_role_entry(rule: &RolePermissionRule) -> Option<ScopeResource> {
    rule.has_resource_role().then(|| ScopeResource {
        resource: rule.resource.clone(),
        action: rule.action.clone(),
        resource_role: Some(rule.resource_role.trim().to_string()),
    })
}
