use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::scope::ScopeRef;

/// What a membership row carries: an assigned role or a free-form label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKey {
    Role,
    Label,
}

impl ResourceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKey::Role => "role",
            ResourceKey::Label => "label",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "role" => Ok(ResourceKey::Role),
            "label" => Ok(ResourceKey::Label),
            other => Err(AppError::internal(format!("invalid member resource key: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRow {
    pub user_id: String,
    pub scope: ScopeRef,
    pub parent_id: u64,
    pub resource_key: ResourceKey,
    pub resource_value: String,
}

impl MembershipRow {
    pub fn role(&self) -> Option<&str> {
        match self.resource_key {
            ResourceKey::Role => Some(self.resource_value.trim()).filter(|r| !r.is_empty()),
            ResourceKey::Label => None,
        }
    }
}

/// Role names carried by `rows`, labels skipped, first occurrence order kept.
pub fn roles_of(rows: &[MembershipRow]) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for role in rows.iter().filter_map(MembershipRow::role) {
        if !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
    }
    roles
}
