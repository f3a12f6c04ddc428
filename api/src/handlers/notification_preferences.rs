//! Notification preference handlers
//!
//! Users can only read and change their own settings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::{
    NotificationPreference, NotificationType, PreferenceSettings, PreferenceStats,
    PreferenceUpdate, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub preferences: Vec<PreferenceSettings>,
}

/// GET /users/:user_id/notification-preferences
pub async fn list_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<NotificationPreference>>, AppError> {
    let preferences = state
        .notification_preference_service
        .list(&user, &UserId(user_id))
        .await?;
    Ok(Json(preferences))
}

/// POST /users/:user_id/notification-preferences
pub async fn create_preference(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(settings): Json<PreferenceSettings>,
) -> Result<(StatusCode, Json<NotificationPreference>), AppError> {
    let preference = state
        .notification_preference_service
        .create(&user, &UserId(user_id), settings)
        .await?;
    Ok((StatusCode::CREATED, Json(preference)))
}

/// PUT /users/:user_id/notification-preferences/:notification_type
pub async fn update_preference(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((user_id, notification_type)): Path<(Uuid, NotificationType)>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<Json<NotificationPreference>, AppError> {
    let preference = state
        .notification_preference_service
        .update(&user, &UserId(user_id), notification_type, update)
        .await?;
    Ok(Json(preference))
}

/// DELETE /users/:user_id/notification-preferences/:notification_type
///
/// The type falls back to all channels enabled.
pub async fn delete_preference(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((user_id, notification_type)): Path<(Uuid, NotificationType)>,
) -> Result<StatusCode, AppError> {
    state
        .notification_preference_service
        .delete(&user, &UserId(user_id), notification_type)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/:user_id/notification-preferences/bulk-update
pub async fn bulk_update_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<Vec<NotificationPreference>>, AppError> {
    let saved = state
        .notification_preference_service
        .bulk_update(&user, &UserId(user_id), req.preferences)
        .await?;
    Ok(Json(saved))
}

/// POST /users/:user_id/notification-preferences/create-defaults
pub async fn create_default_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Vec<NotificationPreference>>), AppError> {
    let created = state
        .notification_preference_service
        .create_defaults(&user, &UserId(user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /users/:user_id/notification-preferences/stats
pub async fn preference_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PreferenceStats>, AppError> {
    let stats = state
        .notification_preference_service
        .stats(&user, &UserId(user_id))
        .await?;
    Ok(Json(stats))
}
