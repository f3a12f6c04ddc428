//! Notification handlers
//!
//! Every endpoint is scoped to the caller's own notifications.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::NotificationStats;
use crate::domain::entities::{Notification, NotificationId, Page, PageRequest, User};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Page<Notification>>, AppError> {
    let page = state
        .notification_service
        .list(
            &user,
            query.unread_only,
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

/// GET /notifications/stats
pub async fn notification_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<NotificationStats>, AppError> {
    let stats = state.notification_service.stats(&user).await?;
    Ok(Json(stats))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state.notification_service.count_unread(&user.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state
        .notification_service
        .mark_read(&user, &NotificationId(id))
        .await?;
    Ok(Json(notification))
}

/// POST /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.notification_service.mark_all_read(&user).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .notification_service
        .delete(&user, &NotificationId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
