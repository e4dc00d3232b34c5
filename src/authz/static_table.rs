use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::errors::{AppError, AppResult};
use crate::models::rule::{RolePermissionRule, RuleKey, RuleOrigin};
use crate::models::scope::ScopeKind;

/// One entry of a permission file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticRecord {
    scope: ScopeKind,
    role: String,
    #[serde(default)]
    resource_role: String,
    resource: String,
    action: String,
}

impl From<StaticRecord> for RolePermissionRule {
    fn from(record: StaticRecord) -> Self {
        RolePermissionRule {
            scope: record.scope,
            role: record.role,
            resource_role: record.resource_role,
            resource: record.resource,
            action: record.action,
            creator: String::new(),
            origin: RuleOrigin::Static,
            created_at: None,
        }
    }
}

/// Baseline role permissions shipped with the service, immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionTable {
    rules: HashMap<RuleKey, RolePermissionRule>,
}

impl StaticPermissionTable {
    /// Loads every `.yml`/`.yaml` file under `dir`, recursively, in file name order.
    ///
    /// A later record with the same (scope, resource, action) replaces an earlier one.
    /// Any unreadable or malformed file fails the whole load.
    pub fn load(dir: &Path) -> AppResult<Self> {
        if !dir.is_dir() {
            return Err(AppError::static_table(format!(
                "permission directory not found: {}",
                dir.display()
            )));
        }

        let mut table = Self::default();
        let mut files = 0usize;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| AppError::static_table(format!("{}: {}", dir.display(), e)))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_yaml(path) {
                continue;
            }

            let text = std::fs::read_to_string(path)
                .map_err(|e| AppError::static_table(format!("{}: {}", path.display(), e)))?;
            let records = parse_records(&text)
                .map_err(|e| AppError::static_table(format!("{}: {}", path.display(), e)))?;

            files += 1;
            for record in records {
                table.insert(record.into());
            }
        }

        tracing::info!(dir = %dir.display(), files, rules = table.len(), "static permission table loaded");
        Ok(table)
    }

    pub fn from_rules(rules: impl IntoIterator<Item = RolePermissionRule>) -> Self {
        let mut table = Self::default();
        for rule in rules {
            table.insert(rule);
        }
        table
    }

    fn insert(&mut self, rule: RolePermissionRule) {
        let key = rule.key();
        if self.rules.insert(key.clone(), rule).is_some() {
            tracing::warn!(
                scope = %key.scope,
                resource = %key.resource,
                action = %key.action,
                "duplicate static permission replaced"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, key: &RuleKey) -> Option<&RolePermissionRule> {
        self.rules.get(key)
    }

    /// Static rules of `scope` granting any of `roles`, keyed for merging.
    pub fn rules_for_roles(&self, scope: ScopeKind, roles: &[String]) -> HashMap<RuleKey, RolePermissionRule> {
        self.rules
            .iter()
            .filter(|(key, rule)| key.scope == scope && rule.grants_any_role(roles))
            .map(|(key, rule)| (key.clone(), rule.clone()))
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

fn parse_records(text: &str) -> Result<Vec<StaticRecord>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let deserializer = serde_yaml::Deserializer::from_str(text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        format!("{} at {}", err.into_inner(), path)
    })
}
