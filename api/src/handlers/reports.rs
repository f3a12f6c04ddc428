//! Report handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{GroupBy, ProjectReport, TimeReport, TimeReportQuery, UserPerformance};
use crate::domain::entities::{ProjectId, User, UserId};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TimeReportParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub project_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub group_by: GroupBy,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceParams {
    pub user_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// GET /reports/time
///
/// Hours and labor cost grouped by user, project, category or date.
pub async fn time_report(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<TimeReportParams>,
) -> Result<Json<TimeReport>, AppError> {
    let report = state
        .report_service
        .time_report(
            &user,
            TimeReportQuery {
                start_date: params.start_date,
                end_date: params.end_date,
                project_id: params.project_id.map(ProjectId),
                user_id: params.user_id.map(UserId),
                group_by: params.group_by,
            },
        )
        .await?;
    Ok(Json(report))
}

/// GET /reports/projects/:id
pub async fn project_report(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectReport>, AppError> {
    let report = state
        .report_service
        .project_report(&user, &ProjectId(id))
        .await?;
    Ok(Json(report))
}

/// GET /reports/performance
///
/// Defaults to the caller; managers may ask for anyone.
pub async fn user_performance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<PerformanceParams>,
) -> Result<Json<UserPerformance>, AppError> {
    let report = state
        .report_service
        .user_performance(
            &user,
            params.user_id.map(UserId),
            params.start_date,
            params.end_date,
        )
        .await?;
    Ok(Json(report))
}
