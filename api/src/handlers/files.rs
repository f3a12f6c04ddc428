//! File handlers
//!
//! Multipart uploads, downloads, versions and per-file permissions.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::context::{snapshot, RequestContext};
use crate::app::{UploadFile, UploadVersion};
use crate::domain::entities::{
    AuditAction, FileFilter, FileId, FilePermission, FileUpdate, FileVersion, FileVersionId,
    NewAuditLog, Page, PageRequest, PermissionLevel, ProjectId, StoredFile, TaskId, User, UserId,
};
use crate::error::AppError;
use crate::AppState;

/// Query parameters for listing files
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileRequest {
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub user_id: Uuid,
    pub level: PermissionLevel,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The `file` part of a multipart body plus its text fields
#[derive(Debug, Default)]
struct MultipartUpload {
    file: Option<(String, String, Vec<u8>)>,
    description: Option<String>,
    change_description: Option<String>,
    is_public: bool,
    project_id: Option<ProjectId>,
    task_id: Option<TaskId>,
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", e))
}

/// `text/plain; charset=utf-8` → `text/plain`
fn normalize_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Option<Uuid>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("Invalid {}", name)))
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartUpload, AppError> {
    let mut upload = MultipartUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let mime = normalize_mime(field.content_type().unwrap_or("application/octet-stream"));
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            upload.file = Some((file_name, mime, bytes.to_vec()));
            continue;
        }

        let text = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "description" => upload.description = Some(text).filter(|t| !t.trim().is_empty()),
            "change_description" => {
                upload.change_description = Some(text).filter(|t| !t.trim().is_empty())
            }
            "is_public" => {
                upload.is_public = matches!(text.trim().to_lowercase().as_str(), "true" | "1" | "on")
            }
            "project_id" => upload.project_id = parse_uuid_field("project_id", &text)?.map(ProjectId),
            "task_id" => upload.task_id = parse_uuid_field("task_id", &text)?.map(TaskId),
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    Ok(upload)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// GET /files
///
/// Only files the caller can read are returned.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Page<StoredFile>>, AppError> {
    let filter = FileFilter {
        project_id: query.project_id.map(ProjectId),
        task_id: query.task_id.map(TaskId),
        mime_type: query.mime_type,
        readable_by: None,
    };
    let page = state
        .file_service
        .list(&user, &filter, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// POST /files
///
/// Multipart fields: `file`, `description`, `is_public`, `project_id`, `task_id`.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), AppError> {
    let upload = read_multipart(multipart).await?;
    let (original_name, mime_type, bytes) = upload
        .file
        .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let file = state
        .file_service
        .upload(
            &user,
            UploadFile {
                original_name,
                mime_type,
                bytes,
                description: upload.description,
                is_public: upload.is_public,
                project_id: upload.project_id,
                task_id: upload.task_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredFile>, AppError> {
    let file = state.file_service.get(&user, &FileId(id)).await?;
    Ok(Json(file))
}

/// GET /files/:id/download
///
/// Streams the current version.
pub async fn download_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (file, content) = state.file_service.download(&user, &FileId(id)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&file.original_name),
            ),
        ],
        Body::from_stream(content),
    )
        .into_response())
}

/// PUT /files/:id
pub async fn update_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<StoredFile>, AppError> {
    let update = FileUpdate {
        original_name: req.original_name,
        description: req.description,
        is_public: req.is_public,
    };
    let file = state
        .file_service
        .update(&user, &FileId(id), update)
        .await?;
    Ok(Json(file))
}

/// DELETE /files/:id
///
/// Soft delete; needs admin level on the file.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let file = state.file_service.delete(&user, &FileId(id)).await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::Delete, "file")
                .entity(id)
                .old_values(snapshot(&file)),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /files/:id/versions
pub async fn list_versions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FileVersion>>, AppError> {
    let versions = state.file_service.versions(&user, &FileId(id)).await?;
    Ok(Json(versions))
}

/// POST /files/:id/versions
///
/// Multipart fields: `file`, `change_description`.
pub async fn upload_version(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileVersion>), AppError> {
    let upload = read_multipart(multipart).await?;
    let (original_name, mime_type, bytes) = upload
        .file
        .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let version = state
        .file_service
        .upload_version(
            &user,
            &FileId(id),
            UploadVersion {
                original_name,
                mime_type,
                bytes,
                change_description: upload.change_description.or(upload.description),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// POST /files/:id/versions/:version_id/rollback
pub async fn rollback_version(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StoredFile>, AppError> {
    let file = state
        .file_service
        .rollback(&user, &FileId(id), &FileVersionId(version_id))
        .await?;
    Ok(Json(file))
}

/// GET /files/:id/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FilePermission>>, AppError> {
    let grants = state.file_service.permissions(&user, &FileId(id)).await?;
    Ok(Json(grants))
}

/// POST /files/:id/permissions
pub async fn grant_permission(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantPermissionRequest>,
) -> Result<(StatusCode, Json<FilePermission>), AppError> {
    let grant = state
        .file_service
        .grant(
            &user,
            &FileId(id),
            UserId(req.user_id),
            req.level,
            req.expires_at,
        )
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::GrantPermission, "file")
                .entity(id)
                .new_values(json!({
                    "user_id": grant.user_id,
                    "level": grant.level,
                    "expires_at": grant.expires_at,
                })),
        ),
    );

    Ok((StatusCode::CREATED, Json(grant)))
}

/// DELETE /files/:id/permissions/:user_id
pub async fn revoke_permission(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ctx: RequestContext,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .file_service
        .revoke(&user, &FileId(id), &UserId(user_id))
        .await?;

    state.audit_service.record(
        ctx.stamp(
            NewAuditLog::new(Some(user.id), AuditAction::RevokePermission, "file")
                .entity(id)
                .old_values(json!({ "user_id": user_id })),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_strips_parameters() {
        assert_eq!(normalize_mime("Text/Plain; charset=utf-8"), "text/plain");
        assert_eq!(normalize_mime("application/pdf"), "application/pdf");
    }

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        let value = content_disposition("résumé \"v2\".pdf");
        assert!(value.starts_with("attachment; filename=\"r_sum_ _v2_.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22.pdf"));
        assert!(value.is_ascii());
    }

    #[test]
    fn test_parse_uuid_field() {
        assert_eq!(parse_uuid_field("project_id", " ").unwrap(), None);
        assert!(parse_uuid_field("project_id", "nope").is_err());
        let id = Uuid::new_v4();
        assert_eq!(
            parse_uuid_field("project_id", &id.to_string()).unwrap(),
            Some(id)
        );
    }
}
