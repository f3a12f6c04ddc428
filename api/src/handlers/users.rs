//! User handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::context::RequestContext;
use crate::domain::entities::{
    AuditAction, NewAuditLog, Page, PageRequest, ProfileUpdate, User, UserFilter, UserId, UserRole,
};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for listing users
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

/// GET /users
///
/// List users (managers only).
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let filter = UserFilter {
        role: query.role,
        is_active: query.is_active,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let page = state
        .user_service
        .list(&user, &filter, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// GET /users/me
pub async fn get_me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// PUT /users/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<User>, AppError> {
    let updated = state
        .user_service
        .update_me(
            &user,
            ProfileUpdate {
                first_name: req.first_name,
                last_name: req.last_name,
                avatar_url: req.avatar_url,
            },
        )
        .await?;
    Ok(Json(updated))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let found = state.user_service.get(&user, &UserId(id)).await?;
    Ok(Json(found))
}

/// PUT /users/:id/role
pub async fn update_role(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<User>, AppError> {
    let (before, after) = state
        .user_service
        .update_role(&user, &UserId(id), req.role)
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::ChangeRole, "user")
                .entity(id)
                .old_values(json!({ "role": before.role }))
                .new_values(json!({ "role": after.role })),
        ),
    );

    Ok(Json(after))
}

/// POST /users/:id/activate
pub async fn activate_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    set_active(state, user, ctx, UserId(id), true).await
}

/// POST /users/:id/deactivate
///
/// Admins cannot deactivate themselves.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    set_active(state, user, ctx, UserId(id), false).await
}

async fn set_active(
    state: AppState,
    user: User,
    ctx: RequestContext,
    id: UserId,
    active: bool,
) -> Result<Json<User>, AppError> {
    let updated = state.user_service.set_active(&user, &id, active).await?;

    let action = if active {
        AuditAction::Activate
    } else {
        AuditAction::Deactivate
    };
    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), action, "user")
                .entity(id.0)
                .new_values(json!({ "is_active": active })),
        ),
    );

    Ok(Json(updated))
}
