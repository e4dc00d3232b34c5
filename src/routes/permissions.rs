use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::PermissionEvaluator;
use crate::errors::AppResult;
use crate::identity::CallerId;
use crate::models::permission::{
    PermissionCheckRequest, PermissionCheckResponse, PermissionList, PublicScopeResponse, ScopeQuery,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_permissions))
        .route("/actions/check", post(check_permission))
        .route("/public", get(check_public_scope))
}

/// Decide whether a user may perform an action on a resource within a scope
#[utoipa::path(
    post,
    path = "/api/permissions/actions/check",
    tag = "Permissions",
    request_body = PermissionCheckRequest,
    responses(
        (status = 200, description = "Decision", body = PermissionCheckResponse),
        (status = 500, description = "No decision could be made; treat as denied"),
    )
)]
pub async fn check_permission(
    State(state): State<AppState>,
    Json(req): Json<PermissionCheckRequest>,
) -> AppResult<Json<PermissionCheckResponse>> {
    let access = state.engine.check_permission(&req).await?;
    Ok(Json(PermissionCheckResponse { access }))
}

/// List the caller's roles and permissions at a scope
#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "Permissions",
    params(
        ("scope" = String, Query, description = "sys, org, project or app"),
        ("scope_id" = u64, Query, description = "Scope instance id"),
    ),
    responses(
        (status = 200, description = "Permission list", body = PermissionList),
        (status = 401, description = "User-ID header missing"),
        (status = 501, description = "Listing is not available for service accounts"),
    )
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<PermissionList>> {
    let list = state
        .engine
        .permission_list(&caller.user_id, query.scope_ref())
        .await?;
    Ok(Json(list))
}

/// Whether a scope is visible to the caller without a direct membership
#[utoipa::path(
    get,
    path = "/api/permissions/public",
    tag = "Permissions",
    params(
        ("scope" = String, Query, description = "sys, org, project or app"),
        ("scope_id" = u64, Query, description = "Scope instance id"),
    ),
    responses(
        (status = 200, description = "Visibility", body = PublicScopeResponse),
        (status = 401, description = "User-ID header missing"),
    )
)]
pub async fn check_public_scope(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<PublicScopeResponse>> {
    let public = state
        .engine
        .check_public_scope(&caller.user_id, query.scope_ref())
        .await?;
    Ok(Json(PublicScopeResponse { public }))
}
