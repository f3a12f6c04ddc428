//! Auth handlers
//!
//! Registration, login, token refresh and session endpoints.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::context::RequestContext;
use crate::app::{RefreshedToken, Registration};
use crate::auth::{AccessClaims, TokenPair};
use crate::domain::entities::{AuditAction, NewAuditLog, User, UserRole};
use crate::error::AppError;
use crate::AppState;

/// Request to create an account
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<UserRole>,
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Tokens plus the authenticated user
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /auth/register
///
/// Create a developer account. Other roles are assigned by an admin.
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, tokens) = state
        .auth_service
        .register(Registration {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            hourly_rate: req.hourly_rate,
        })
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Register, "user")
                .entity(user.id.0)
                .new_values(json!({ "email": user.email, "role": user.role })),
        ),
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { tokens, user })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = state.auth_service.login(&req.email, &req.password).await?;

    state.audit_service.record(
        ctx.stamp(NewAuditLog::new(Some(user.id), AuditAction::Login, "user").entity(user.id.0)),
    );

    Ok(Json(AuthResponse { tokens, user }))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshedToken>, AppError> {
    let token = state.auth_service.refresh(&req.refresh_token).await?;
    Ok(Json(token))
}

/// POST /auth/logout
///
/// Revokes the presented access token, and the refresh token when one is sent.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    body: Option<Json<LogoutRequest>>,
) -> Json<MessageResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    state
        .auth_service
        .logout(&claims, req.refresh_token.as_deref())
        .await;

    Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

/// GET /auth/me
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth_service
        .change_password(&user, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}
