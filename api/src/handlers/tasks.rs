//! Task handlers
//!
//! Task CRUD, workflow transitions, assignment and dependencies.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::context::{snapshot, RequestContext};
use crate::app::{CreateTask, TaskStatistics};
use crate::domain::entities::{
    AuditAction, DependencyType, NewAuditLog, Page, PageRequest, ProjectId, Task, TaskDependency,
    TaskFilter, TaskId, TaskPriority, TaskStatus, TaskUpdate, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Only tasks past their due date that are not done
    #[serde(default)]
    pub overdue: bool,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub dependency_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

/// `assignee_id: null` unassigns the task
#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AddDependencyRequest {
    pub depends_on_id: Uuid,
    pub dependency_type: Option<DependencyType>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub project_id: Option<Uuid>,
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Page<Task>>, AppError> {
    let filter = TaskFilter {
        project_ids: None,
        project_id: query.project_id.map(ProjectId),
        assignee_id: query.assignee_id.map(UserId),
        status: query.status,
        priority: query.priority,
        overdue_as_of: query.overdue.then(|| Utc::now().date_naive()),
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let page = state
        .task_service
        .list(&user, &filter, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// POST /tasks
///
/// The assignee must be on the project team. Dependencies are added as `depends_on`.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = state
        .task_service
        .create(
            &user,
            CreateTask {
                project_id: ProjectId(req.project_id),
                title: req.title,
                description: req.description,
                assignee_id: req.assignee_id.map(UserId),
                priority: req.priority.unwrap_or(TaskPriority::Medium),
                estimated_hours: req.estimated_hours,
                due_date: req.due_date,
                dependency_ids: req.dependency_ids.into_iter().map(TaskId).collect(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks/statistics
pub async fn task_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<TaskStatistics>, AppError> {
    let stats = state
        .task_service
        .statistics(&user, query.project_id.map(ProjectId))
        .await?;
    Ok(Json(stats))
}

/// GET /tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let task = state.task_service.get(&user, &TaskId(id)).await?;
    Ok(Json(task))
}

/// PUT /tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let update = TaskUpdate {
        title: req.title,
        description: req.description,
        priority: req.priority,
        estimated_hours: req.estimated_hours,
        due_date: req.due_date,
    };
    let task = state
        .task_service
        .update(&user, &TaskId(id), update)
        .await?;
    Ok(Json(task))
}

/// PATCH /tasks/:id/status
///
/// Starting or finishing a task fails while a blocking prerequisite is open.
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .task_service
        .update_status(&user, &TaskId(id), req.status)
        .await?;
    Ok(Json(task))
}

/// PATCH /tasks/:id/assign
pub async fn assign_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .task_service
        .assign(&user, &TaskId(id), req.assignee_id.map(UserId))
        .await?;
    Ok(Json(task))
}

/// DELETE /tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let task = state.task_service.delete(&user, &TaskId(id)).await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Delete, "task")
                .entity(id)
                .old_values(snapshot(&task)),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /tasks/:id/dependencies
pub async fn list_dependencies(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TaskDependency>>, AppError> {
    let deps = state.task_service.dependencies(&user, &TaskId(id)).await?;
    Ok(Json(deps))
}

/// POST /tasks/:id/dependencies
///
/// Rejects self references, cross-project edges and cycles.
pub async fn add_dependency(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddDependencyRequest>,
) -> Result<(StatusCode, Json<TaskDependency>), AppError> {
    let dep = state
        .task_service
        .add_dependency(
            &user,
            &TaskId(id),
            &TaskId(req.depends_on_id),
            req.dependency_type.unwrap_or(DependencyType::DependsOn),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dep)))
}

/// DELETE /tasks/:id/dependencies/:depends_on_id
pub async fn remove_dependency(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((id, depends_on_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .task_service
        .remove_dependency(&user, &TaskId(id), &TaskId(depends_on_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
