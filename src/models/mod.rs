pub mod membership;
pub mod permission;
pub mod rule;
pub mod scope;
