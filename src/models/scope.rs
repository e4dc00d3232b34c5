use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Level of the tenancy hierarchy a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Sys,
    Org,
    Project,
    App,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Sys => "sys",
            ScopeKind::Org => "org",
            ScopeKind::Project => "project",
            ScopeKind::App => "app",
        }
    }

    /// Scope kind directly containing this one.
    pub fn parent(&self) -> Option<ScopeKind> {
        match self {
            ScopeKind::App => Some(ScopeKind::Project),
            ScopeKind::Project => Some(ScopeKind::Org),
            ScopeKind::Org | ScopeKind::Sys => None,
        }
    }

    /// Scope kind directly contained by this one.
    pub fn child(&self) -> Option<ScopeKind> {
        match self {
            ScopeKind::Org => Some(ScopeKind::Project),
            ScopeKind::Project => Some(ScopeKind::App),
            ScopeKind::App | ScopeKind::Sys => None,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sys" => Ok(ScopeKind::Sys),
            "org" => Ok(ScopeKind::Org),
            "project" => Ok(ScopeKind::Project),
            "app" => Ok(ScopeKind::App),
            other => Err(AppError::bad_request(format!("unknown scope: {other}"))),
        }
    }
}

/// A concrete scope instance. The id is ignored for `sys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRef {
    pub kind: ScopeKind,
    pub id: u64,
}

impl ScopeRef {
    pub fn new(kind: ScopeKind, id: u64) -> Self {
        let id = if kind == ScopeKind::Sys { 0 } else { id };
        Self { kind, id }
    }

    pub fn sys() -> Self {
        Self::new(ScopeKind::Sys, 0)
    }

    pub fn org(id: u64) -> Self {
        Self::new(ScopeKind::Org, id)
    }

    pub fn project(id: u64) -> Self {
        Self::new(ScopeKind::Project, id)
    }

    pub fn app(id: u64) -> Self {
        Self::new(ScopeKind::App, id)
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScopeKind::Sys => f.write_str("sys"),
            kind => write!(f, "{kind}:{}", self.id),
        }
    }
}

/// Visibility metadata of a scope instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeInfo {
    pub is_public: bool,
    /// Id of the containing scope; 0 for organizations.
    pub parent_id: u64,
}

pub const PROJECT_SERVICE_MODE: &str = "PROJECT_SERVICE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub id: u64,
    pub project_id: u64,
    pub mode: String,
}

impl ApplicationInfo {
    /// Project-service applications share one role space with their siblings.
    pub fn is_project_service(&self) -> bool {
        self.mode.eq_ignore_ascii_case(PROJECT_SERVICE_MODE)
    }
}
