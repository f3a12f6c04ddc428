//! Project handlers
//!
//! Endpoints for projects and their team memberships.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::context::{snapshot, RequestContext};
use crate::app::CreateProject;
use crate::domain::entities::{
    AuditAction, NewAuditLog, Page, PageRequest, Project, ProjectFilter, ProjectId, ProjectStatus,
    ProjectUpdate, TeamMember, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for listing projects
#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
    pub search: Option<String>,
    /// Restrict to projects the caller manages or belongs to
    #[serde(default)]
    pub my_projects: bool,
}

/// Request to create a new project
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    /// Defaults to the caller
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub team_member_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub actual_cost: Option<f64>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Option<String>,
}

/// GET /projects
///
/// Admins see every project; everyone else sees the projects they belong to.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Page<Project>>, AppError> {
    let filter = ProjectFilter {
        status: query.status,
        manager_id: query.manager_id.map(UserId),
        search: query.search.filter(|s| !s.trim().is_empty()),
        member_id: None,
    };
    let page = state
        .project_service
        .list(
            &user,
            &filter,
            query.my_projects,
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

/// POST /projects
///
/// Create a project (admins only). The manager joins the team automatically.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = state
        .project_service
        .create(
            &user,
            CreateProject {
                name: req.name,
                description: req.description,
                start_date: req.start_date,
                end_date: req.end_date,
                budget: req.budget,
                manager_id: req.manager_id.map(UserId),
                team_member_ids: req.team_member_ids.into_iter().map(UserId).collect(),
            },
        )
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Create, "project")
                .entity(project.id.0)
                .new_values(snapshot(&project)),
        ),
    );

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = state.project_service.get(&user, &ProjectId(id)).await?;
    Ok(Json(project))
}

/// PUT /projects/:id
///
/// Requires the project manager or an admin.
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let update = ProjectUpdate {
        name: req.name,
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        budget: req.budget,
        actual_cost: req.actual_cost,
        status: req.status,
        manager_id: req.manager_id.map(UserId),
    };
    let (before, after) = state
        .project_service
        .update(&user, &ProjectId(id), update)
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Update, "project")
                .entity(id)
                .old_values(snapshot(&before))
                .new_values(snapshot(&after)),
        ),
    );

    Ok(Json(after))
}

/// DELETE /projects/:id
///
/// Removes the project with its tasks and memberships.
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let project = state.project_service.delete(&user, &ProjectId(id)).await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Delete, "project")
                .entity(id)
                .old_values(snapshot(&project)),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    let members = state.project_service.members(&user, &ProjectId(id)).await?;
    Ok(Json(members))
}

/// POST /projects/:id/members
///
/// Adds a member, or reactivates one who left.
pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<TeamMember>), AppError> {
    let member = state
        .project_service
        .add_member(&user, &ProjectId(id), &UserId(req.user_id), req.role)
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::AddMember, "project")
                .entity(id)
                .new_values(json!({ "user_id": member.user_id, "role": member.role })),
        ),
    );

    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /projects/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .project_service
        .remove_member(&user, &ProjectId(id), &UserId(user_id))
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::RemoveMember, "project")
                .entity(id)
                .old_values(json!({ "user_id": user_id })),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}
