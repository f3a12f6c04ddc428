//! Analytics handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::{Dashboard, ProjectAnalytics};
use crate::domain::entities::{ProjectId, User};
use crate::error::AppError;
use crate::AppState;

/// GET /analytics/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = state.analytics_service.dashboard(&user).await?;
    Ok(Json(dashboard))
}

/// GET /analytics/projects/:id
///
/// Progress, time variance, team performance, budget use and risk score.
pub async fn project_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectAnalytics>, AppError> {
    let analytics = state
        .analytics_service
        .project_analytics(&user, &ProjectId(id))
        .await?;
    Ok(Json(analytics))
}
