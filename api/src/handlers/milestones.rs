//! Milestone handlers
//!
//! Project-scoped listing and creation; edits address a milestone directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::context::RequestContext;
use crate::app::{CreateMilestone, MilestoneDetail};
use crate::domain::entities::{
    AuditAction, Milestone, MilestoneDependency, MilestoneId, MilestoneStats, MilestoneUpdate,
    NewAuditLog, ProjectId, User,
};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMilestonesQuery {
    pub is_completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMilestoneRequest {
    pub name: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub dependency_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AddMilestoneDependencyRequest {
    pub prerequisite_milestone_id: Uuid,
}

/// GET /projects/:project_id/milestones
pub async fn list_milestones(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListMilestonesQuery>,
) -> Result<Json<Vec<Milestone>>, AppError> {
    let milestones = state
        .milestone_service
        .list(&user, &ProjectId(project_id), query.is_completed)
        .await?;
    Ok(Json(milestones))
}

/// POST /projects/:project_id/milestones
///
/// Manager only. The due date cannot be in the past.
pub async fn create_milestone(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateMilestoneRequest>,
) -> Result<(StatusCode, Json<Milestone>), AppError> {
    let milestone = state
        .milestone_service
        .create(
            &user,
            CreateMilestone {
                project_id: ProjectId(project_id),
                name: req.name,
                description: req.description,
                due_date: req.due_date,
                dependency_ids: req.dependency_ids.into_iter().map(MilestoneId).collect(),
            },
        )
        .await?;

    state.audit_service.record(ctx.stamp(
        NewAuditLog::new(Some(user.id), AuditAction::Create, "milestone").entity(milestone.id.0),
    ));

    Ok((StatusCode::CREATED, Json(milestone)))
}

/// GET /projects/:project_id/milestones/stats
pub async fn milestone_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<MilestoneStats>, AppError> {
    let stats = state
        .milestone_service
        .stats(&user, &ProjectId(project_id))
        .await?;
    Ok(Json(stats))
}

/// GET /projects/:project_id/milestones/:milestone_id
pub async fn get_milestone(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((project_id, milestone_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MilestoneDetail>, AppError> {
    let detail = state
        .milestone_service
        .get(&user, &ProjectId(project_id), &MilestoneId(milestone_id))
        .await?;
    Ok(Json(detail))
}

/// PUT /projects/milestones/:milestone_id
///
/// Setting `is_completed` notifies the project team.
pub async fn update_milestone(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(milestone_id): Path<Uuid>,
    Json(update): Json<MilestoneUpdate>,
) -> Result<Json<Milestone>, AppError> {
    let milestone = state
        .milestone_service
        .update(&user, &MilestoneId(milestone_id), update)
        .await?;
    Ok(Json(milestone))
}

/// DELETE /projects/milestones/:milestone_id
pub async fn delete_milestone(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(milestone_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .milestone_service
        .delete(&user, &MilestoneId(milestone_id))
        .await?;

    state.audit_service.record(ctx.stamp(
        NewAuditLog::new(Some(user.id), AuditAction::Delete, "milestone").entity(milestone_id),
    ));

    Ok(StatusCode::NO_CONTENT)
}

/// POST /projects/milestones/:milestone_id/dependencies
pub async fn add_milestone_dependency(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(milestone_id): Path<Uuid>,
    Json(req): Json<AddMilestoneDependencyRequest>,
) -> Result<(StatusCode, Json<MilestoneDependency>), AppError> {
    let dependency = state
        .milestone_service
        .add_dependency(
            &user,
            &MilestoneId(milestone_id),
            &MilestoneId(req.prerequisite_milestone_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dependency)))
}

/// DELETE /projects/milestones/:milestone_id/dependencies/:prerequisite_milestone_id
pub async fn remove_milestone_dependency(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((milestone_id, prerequisite_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .milestone_service
        .remove_dependency(
            &user,
            &MilestoneId(milestone_id),
            &MilestoneId(prerequisite_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
