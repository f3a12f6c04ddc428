//! Comment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::CreateComment;
use crate::domain::entities::{
    Comment, CommentEntityType, CommentId, CommentThread, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// GET /comments?entity_type=task&entity_id=...
///
/// Top-level comments with their replies nested.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<Vec<CommentThread>>, AppError> {
    let threads = state
        .comment_service
        .list(&user, query.entity_type, query.entity_id)
        .await?;
    Ok(Json(threads))
}

/// POST /comments
///
/// Mentioned users and the task assignee are notified.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state
        .comment_service
        .create(
            &user,
            CreateComment {
                entity_type: req.entity_type,
                entity_id: req.entity_id,
                content: req.content,
                parent_comment_id: req.parent_comment_id.map(CommentId),
                mentions: req.mentions.into_iter().map(UserId).collect(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /comments/:id
///
/// Author only, within 24 hours.
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let comment = state
        .comment_service
        .update(&user, &CommentId(id), &req.content)
        .await?;
    Ok(Json(comment))
}

/// DELETE /comments/:id
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.comment_service.delete(&user, &CommentId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
