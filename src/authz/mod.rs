//! Authorization module - scope-aware permission engine
//!
//! This module answers two questions for the rest of the platform:
//! - can an actor perform an action on a resource within a scope
//! - which permissions an actor holds at a scope
//!
//! Actors are classified first (service account, system admin, support,
//! member); members are then resolved from their memberships, with public /
//! containment fallback and sibling aggregation for project-service apps.
//! Role permissions come from database rules layered over a static table.

mod app_aggregation;
mod context;
mod evaluator;
mod handlers;
mod principal;
mod role_permission;
mod scope_role;
mod static_table;

pub use app_aggregation::AppRoleAggregator;
pub use context::RequestContext;
pub use evaluator::{PermissionEngine, PermissionEvaluator};
pub use handlers::{PermissionHandler, Resolvers};
pub use principal::ActorPolicy;
pub use role_permission::RolePermissionResolver;
pub use scope_role::ScopeRoleResolver;
pub use static_table::StaticPermissionTable;

/// Well-known role names
pub mod roles {
    /// Implicit role for actors who can see a scope without belonging to it.
    pub const GUEST: &str = "Guest";
    /// Synthetic role assigned to the support account.
    pub const SUPPORT: &str = "Support";
}
