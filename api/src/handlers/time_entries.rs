//! Time entry handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::context::RequestContext;
use crate::app::{CreateTimeEntry, TimeStatistics};
use crate::domain::entities::{
    AuditAction, NewAuditLog, Page, PageRequest, ProjectId, TaskId, TimeCategory, TimeEntry,
    TimeEntryFilter, TimeEntryId, TimeEntryUpdate, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for listing entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_approved: Option<bool>,
    pub category: Option<TimeCategory>,
}

impl ListEntriesQuery {
    fn filter(&self) -> TimeEntryFilter {
        TimeEntryFilter {
            user_id: self.user_id.map(UserId),
            project_id: self.project_id.map(ProjectId),
            task_id: self.task_id.map(TaskId),
            start_date: self.start_date,
            end_date: self.end_date,
            is_approved: self.is_approved,
            category: self.category,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub hours: f64,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub category: Option<TimeCategory>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub hours: Option<f64>,
    pub date: Option<NaiveDate>,
    pub category: Option<TimeCategory>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// GET /time-entries
///
/// Non-managers only see their own entries.
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<Page<TimeEntry>>, AppError> {
    let page = state
        .time_entry_service
        .list(
            &user,
            &query.filter(),
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

/// POST /time-entries
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<TimeEntry>), AppError> {
    let entry = state
        .time_entry_service
        .create(
            &user,
            CreateTimeEntry {
                project_id: ProjectId(req.project_id),
                task_id: req.task_id.map(TaskId),
                hours: req.hours,
                date: req.date.unwrap_or_else(|| Utc::now().date_naive()),
                category: req.category.unwrap_or(TimeCategory::Development),
                notes: req.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /time-entries/pending
///
/// Unapproved entries awaiting review (managers only).
pub async fn pending_entries(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TimeEntry>>, AppError> {
    let page = state
        .time_entry_service
        .pending(&user, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// GET /time-entries/statistics
pub async fn entry_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<TimeStatistics>, AppError> {
    let filter = TimeEntryFilter {
        user_id: query.user_id.map(UserId),
        project_id: query.project_id.map(ProjectId),
        start_date: query.start_date,
        end_date: query.end_date,
        ..Default::default()
    };
    let stats = state.time_entry_service.statistics(&user, &filter).await?;
    Ok(Json(stats))
}

/// GET /time-entries/:id
pub async fn get_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<TimeEntry>, AppError> {
    let entry = state.time_entry_service.get(&user, &TimeEntryId(id)).await?;
    Ok(Json(entry))
}

/// PUT /time-entries/:id
///
/// Owner only, within 7 days of logging and before approval.
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<TimeEntry>, AppError> {
    let update = TimeEntryUpdate {
        hours: req.hours,
        date: req.date,
        category: req.category,
        notes: req.notes,
    };
    let entry = state
        .time_entry_service
        .update(&user, &TimeEntryId(id), update)
        .await?;
    Ok(Json(entry))
}

/// DELETE /time-entries/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .time_entry_service
        .delete(&user, &TimeEntryId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /time-entries/:id/approve
pub async fn approve_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<TimeEntry>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let entry = state
        .time_entry_service
        .approve(&user, &TimeEntryId(id), req.notes)
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Approve, "time_entry")
                .entity(id)
                .new_values(json!({
                    "is_approved": true,
                    "hours": entry.hours,
                    "user_id": entry.user_id,
                })),
        ),
    );

    Ok(Json(entry))
}

/// POST /time-entries/:id/reject
pub async fn reject_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<TimeEntry>, AppError> {
    let entry = state
        .time_entry_service
        .reject(&user, &TimeEntryId(id), &req.reason)
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Reject, "time_entry")
                .entity(id)
                .new_values(json!({ "reason": req.reason, "user_id": entry.user_id })),
        ),
    );

    Ok(Json(entry))
}
