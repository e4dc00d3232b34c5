use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{PermissionEngine, StaticPermissionTable};
use crate::config::AuthzConfig;
use crate::errors::AppError;
use crate::routes::{health, permissions};
use crate::store::{MembershipStore, SqliteMembershipStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub table: Arc<StaticPermissionTable>,
    pub engine: Arc<PermissionEngine>,
}

impl AppState {
    /// Loads the static table and wires the engine; fails if the table cannot be loaded.
    pub fn new(pool: SqlitePool, config: &AuthzConfig) -> Result<Self, AppError> {
        let table = Arc::new(StaticPermissionTable::load(&config.permission_dir)?);
        let store: Arc<dyn MembershipStore> = Arc::new(SqliteMembershipStore::new(pool.clone()));
        let engine = Arc::new(PermissionEngine::new(store, Arc::clone(&table), config));

        Ok(Self { pool, table, engine })
    }
}

pub async fn create_app(pool: SqlitePool, config: &AuthzConfig) -> Result<Router, AppError> {
    let state = AppState::new(pool, config)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/permissions", permissions::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
