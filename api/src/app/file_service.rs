//! File service
//!
//! Uploads, downloads, versioning and per-file permissions. Content lives
//! behind the [`FileStorage`] port; metadata behind [`FileRepository`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::access::ensure_project_access;
use crate::domain::entities::{
    file_extension, has_file_access, is_allowed_mime_type, next_version, sanitize_filename,
    FileAccessor, FileFilter, FileId, FilePermission, FileReader, FileUpdate, FileVersion,
    FileVersionId, NewFilePermission, NewFileVersion, NewStoredFile, Page, PageRequest, PermissionLevel,
    ProjectId, StoredFile, TaskId, User, UserId,
};
use crate::domain::ports::{ContentStream, FileRepository, FileStorage, ProjectRepository};
use crate::error::{AppError, DomainError};

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
    pub is_public: bool,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
}

/// New content for an existing file
#[derive(Debug, Clone)]
pub struct UploadVersion {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub change_description: Option<String>,
}

struct StoredObject {
    file_name: String,
    storage_path: String,
}

pub struct FileService<FR, S, PR>
where
    FR: FileRepository,
    S: FileStorage,
    PR: ProjectRepository,
{
    files: Arc<FR>,
    storage: Arc<S>,
    projects: Arc<PR>,
    max_upload_size: usize,
}

impl<FR, S, PR> FileService<FR, S, PR>
where
    FR: FileRepository,
    S: FileStorage,
    PR: ProjectRepository,
{
    pub fn new(files: Arc<FR>, storage: Arc<S>, projects: Arc<PR>, max_upload_size: usize) -> Self {
        Self {
            files,
            storage,
            projects,
            max_upload_size,
        }
    }

    pub async fn upload(&self, caller: &User, upload: UploadFile) -> Result<StoredFile, AppError> {
        self.check_content(&upload.mime_type, upload.bytes.len())?;
        if let Some(project_id) = &upload.project_id {
            ensure_project_access(self.projects.as_ref(), caller, project_id).await?;
        }

        let original_name = sanitize_filename(&upload.original_name);
        let id = FileId::new();
        let object = self.store(id.0, &original_name, &upload.bytes).await?;
        let file_size = upload.bytes.len() as i64;

        let created = self
            .files
            .create(
                &NewStoredFile {
                    file_name: object.file_name,
                    original_name,
                    storage_path: object.storage_path.clone(),
                    file_size,
                    mime_type: upload.mime_type.clone(),
                    description: upload.description,
                    project_id: upload.project_id,
                    task_id: upload.task_id,
                    uploaded_by: caller.id,
                    is_public: upload.is_public,
                },
                &NewFileVersion {
                    file_id: id,
                    version_number: "1.0".to_string(),
                    storage_path: object.storage_path.clone(),
                    file_size,
                    mime_type: upload.mime_type,
                    change_description: Some("Initial upload".to_string()),
                    created_by: caller.id,
                },
            )
            .await;

        match created {
            Ok(file) => {
                tracing::info!(file_id = %file.id, size = file.file_size, "File uploaded");
                Ok(file)
            }
            Err(e) => {
                self.discard(&object.storage_path).await;
                Err(e.into())
            }
        }
    }

    /// Files matching the filter that the caller can read
    pub async fn list(
        &self,
        caller: &User,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<Page<StoredFile>, AppError> {
        let mut filter = filter.clone();
        filter.readable_by = if caller.is_admin() {
            None
        } else {
            let now = Utc::now();
            let granted = self
                .files
                .permissions_for_user(&caller.id)
                .await?
                .into_iter()
                .filter(|g| g.is_valid_at(now))
                .map(|g| g.file_id)
                .collect();
            Some(FileReader {
                user_id: caller.id,
                granted,
            })
        };
        Ok(self.files.list(&filter, page).await?)
    }

    pub async fn get(&self, caller: &User, id: &FileId) -> Result<StoredFile, AppError> {
        self.load_with(caller, id, PermissionLevel::Read).await
    }

    /// Metadata plus a stream over the current version's bytes
    pub async fn download(
        &self,
        caller: &User,
        id: &FileId,
    ) -> Result<(StoredFile, ContentStream), AppError> {
        let file = self.load_with(caller, id, PermissionLevel::Read).await?;
        let content = self.storage.open(&file.storage_path).await?;
        Ok((file, content))
    }

    pub async fn update(
        &self,
        caller: &User,
        id: &FileId,
        update: FileUpdate,
    ) -> Result<StoredFile, AppError> {
        let mut file = self.load_with(caller, id, PermissionLevel::Write).await?;
        if let Some(name) = &update.original_name {
            file.original_name = sanitize_filename(name);
        }
        if let Some(description) = update.description {
            file.description = Some(description);
        }
        if let Some(is_public) = update.is_public {
            file.is_public = is_public;
        }
        Ok(self.files.save(&file).await?)
    }

    /// Soft delete; stored content is kept for restore
    pub async fn delete(&self, caller: &User, id: &FileId) -> Result<StoredFile, AppError> {
        let mut file = self.load_with(caller, id, PermissionLevel::Admin).await?;
        file.is_deleted = true;
        let saved = self.files.save(&file).await?;
        tracing::info!(file_id = %saved.id, "File deleted");
        Ok(saved)
    }

    pub async fn versions(&self, caller: &User, id: &FileId) -> Result<Vec<FileVersion>, AppError> {
        self.load_with(caller, id, PermissionLevel::Read).await?;
        Ok(self.files.versions(id).await?)
    }

    pub async fn upload_version(
        &self,
        caller: &User,
        id: &FileId,
        upload: UploadVersion,
    ) -> Result<FileVersion, AppError> {
        let mut file = self.load_with(caller, id, PermissionLevel::Write).await?;
        self.check_content(&upload.mime_type, upload.bytes.len())?;

        let existing = self.files.versions(id).await?;
        let number = next_version(existing.iter().map(|v| v.version_number.as_str()));

        let name = sanitize_filename(&upload.original_name);
        let object = self.store(Uuid::new_v4(), &name, &upload.bytes).await?;
        let file_size = upload.bytes.len() as i64;

        let version = match self
            .files
            .add_version(&NewFileVersion {
                file_id: file.id,
                version_number: number.to_string(),
                storage_path: object.storage_path.clone(),
                file_size,
                mime_type: upload.mime_type.clone(),
                change_description: upload.change_description,
                created_by: caller.id,
            })
            .await
        {
            Ok(version) => version,
            Err(e) => {
                self.discard(&object.storage_path).await;
                return Err(e.into());
            }
        };

        file.file_name = object.file_name;
        file.storage_path = object.storage_path;
        file.file_size = file_size;
        file.mime_type = upload.mime_type;
        self.files.save(&file).await?;

        tracing::info!(file_id = %file.id, version = %version.version_number, "File version added");
        Ok(version)
    }

    /// Make an older version current again
    pub async fn rollback(
        &self,
        caller: &User,
        id: &FileId,
        version_id: &FileVersionId,
    ) -> Result<StoredFile, AppError> {
        let mut file = self.load_with(caller, id, PermissionLevel::Write).await?;
        let version = self
            .files
            .versions(id)
            .await?
            .into_iter()
            .find(|v| v.id == *version_id)
            .ok_or_else(|| DomainError::NotFound(format!("Version {} not found", version_id)))?;

        self.files.set_current_version(id, version_id).await?;

        file.file_name = version
            .storage_path
            .rsplit('/')
            .next()
            .unwrap_or(&version.storage_path)
            .to_string();
        file.storage_path = version.storage_path;
        file.file_size = version.file_size;
        file.mime_type = version.mime_type;
        Ok(self.files.save(&file).await?)
    }

    pub async fn permissions(
        &self,
        caller: &User,
        id: &FileId,
    ) -> Result<Vec<FilePermission>, AppError> {
        self.load_with(caller, id, PermissionLevel::Admin).await?;
        Ok(self.files.permissions(id).await?)
    }

    pub async fn grant(
        &self,
        caller: &User,
        id: &FileId,
        user_id: UserId,
        level: PermissionLevel,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<FilePermission, AppError> {
        let file = self.load_with(caller, id, PermissionLevel::Admin).await?;
        if user_id == file.uploaded_by {
            return Err(AppError::BadRequest(
                "The uploader already has full access".to_string(),
            ));
        }
        if expires_at.is_some_and(|exp| exp <= Utc::now()) {
            return Err(AppError::BadRequest(
                "Expiry must be in the future".to_string(),
            ));
        }

        let permission = self
            .files
            .upsert_permission(&NewFilePermission {
                file_id: file.id,
                user_id,
                level,
                granted_by: caller.id,
                expires_at,
            })
            .await?;
        tracing::info!(file_id = %file.id, user_id = %user_id, level = %level, "File permission granted");
        Ok(permission)
    }

    pub async fn revoke(&self, caller: &User, id: &FileId, user_id: &UserId) -> Result<(), AppError> {
        self.load_with(caller, id, PermissionLevel::Admin).await?;
        self.files.revoke_permission(id, user_id).await?;
        Ok(())
    }

    fn check_content(&self, mime_type: &str, size: usize) -> Result<(), AppError> {
        if !is_allowed_mime_type(mime_type) {
            return Err(AppError::UnsupportedMediaType(format!(
                "File type {} is not allowed",
                mime_type
            )));
        }
        if size == 0 {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }
        if size > self.max_upload_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_upload_size
            )));
        }
        Ok(())
    }

    /// Write bytes under `yyyy/mm/<stem><ext>`
    async fn store(
        &self,
        stem: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, AppError> {
        let ext = file_extension(original_name).unwrap_or_default();
        let file_name = format!("{}{}", stem, ext);
        let storage_path = format!("{}/{}", Utc::now().format("%Y/%m"), file_name);
        self.storage.save(&storage_path, bytes).await?;
        Ok(StoredObject {
            file_name,
            storage_path,
        })
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(error = %e, key = %key, "Failed to remove orphaned upload");
        }
    }

    async fn load_with(
        &self,
        caller: &User,
        id: &FileId,
        required: PermissionLevel,
    ) -> Result<StoredFile, AppError> {
        let file = self
            .files
            .find_by_id(id)
            .await?
            .filter(|f| !f.is_deleted)
            .ok_or_else(|| DomainError::NotFound(format!("File {} not found", id)))?;

        let grants = self.files.permissions(id).await?;
        if !has_file_access(&file, accessor(caller), &grants, required, Utc::now()) {
            return Err(AppError::forbidden(format!(
                "{} access to this file is required",
                required
            )));
        }
        Ok(file)
    }
}

fn accessor(user: &User) -> FileAccessor {
    FileAccessor {
        user_id: user.id,
        is_admin_role: user.is_admin(),
    }
}
