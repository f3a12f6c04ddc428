//! Audit log handlers (admins only)

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AuditStats;
use crate::domain::entities::{
    AuditAction, AuditFilter, AuditLog, AuditLogId, Page, PageRequest, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AuditStatsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

/// GET /audit
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Page<AuditLog>>, AppError> {
    let filter = AuditFilter {
        user_id: query.user_id.map(UserId),
        action: query.action,
        entity_type: query.entity_type.filter(|t| !t.trim().is_empty()),
        entity_id: query.entity_id,
        start: query.start,
        end: query.end,
    };
    let page = state
        .audit_service
        .list(&user, &filter, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// GET /audit/stats?days=30
pub async fn audit_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AuditStatsQuery>,
) -> Result<Json<AuditStats>, AppError> {
    let stats = state.audit_service.stats(&user, query.days).await?;
    Ok(Json(stats))
}

/// GET /audit/:id
pub async fn get_audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditLog>, AppError> {
    let log = state.audit_service.get(&user, &AuditLogId(id)).await?;
    Ok(Json(log))
}
