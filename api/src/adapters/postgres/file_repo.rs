//! PostgreSQL adapter for FileRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};

use crate::domain::entities::{
    FileFilter, FileId, FilePermission, FileVersion, FileVersionId, NewFilePermission,
    NewFileVersion, NewStoredFile, Page, PageRequest, PermissionLevel, ProjectId, StoredFile,
    TaskId, UserId,
};
use crate::domain::ports::FileRepository;
use crate::entity::{file_permissions, file_versions, files};
use crate::error::DomainError;

/// PostgreSQL implementation of FileRepository
pub struct PostgresFileRepository {
    db: DatabaseConnection,
}

impl PostgresFileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &FileFilter) -> Select<files::Entity> {
    let mut query = files::Entity::find().filter(files::Column::IsDeleted.eq(false));

    if let Some(project) = filter.project_id {
        query = query.filter(files::Column::ProjectId.eq(project.0));
    }
    if let Some(task) = filter.task_id {
        query = query.filter(files::Column::TaskId.eq(task.0));
    }
    if let Some(mime) = &filter.mime_type {
        query = query.filter(files::Column::MimeType.starts_with(mime.as_str()));
    }
    if let Some(reader) = &filter.readable_by {
        query = query.filter(
            Condition::any()
                .add(files::Column::UploadedBy.eq(reader.user_id.0))
                .add(files::Column::IsPublic.eq(true))
                .add(files::Column::Id.is_in(reader.granted.iter().map(|id| id.0))),
        );
    }
    query
}

fn version_model(version: &NewFileVersion, is_current: bool) -> file_versions::ActiveModel {
    file_versions::ActiveModel {
        id: Set(FileVersionId::new().0),
        file_id: Set(version.file_id.0),
        version_number: Set(version.version_number.clone()),
        storage_path: Set(version.storage_path.clone()),
        file_size: Set(version.file_size),
        mime_type: Set(version.mime_type.clone()),
        change_description: Set(version.change_description.clone()),
        created_by: Set(version.created_by.0),
        is_current: Set(is_current),
        created_at: Set(Utc::now().fixed_offset()),
    }
}

#[async_trait]
impl FileRepository for PostgresFileRepository {
    async fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>, DomainError> {
        let result = files::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<Page<StoredFile>, DomainError> {
        let query = filtered(filter);

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let results = query
            .order_by_desc(files::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(Page::new(
            results.into_iter().map(|m| m.into()).collect(),
            page,
            total,
        ))
    }

    async fn create(
        &self,
        file: &NewStoredFile,
        version: &NewFileVersion,
    ) -> Result<StoredFile, DomainError> {
        let now = Utc::now().fixed_offset();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let created = files::ActiveModel {
            id: Set(version.file_id.0),
            file_name: Set(file.file_name.clone()),
            original_name: Set(file.original_name.clone()),
            storage_path: Set(file.storage_path.clone()),
            file_size: Set(file.file_size),
            mime_type: Set(file.mime_type.clone()),
            description: Set(file.description.clone()),
            project_id: Set(file.project_id.map(|p| p.0)),
            task_id: Set(file.task_id.map(|t| t.0)),
            uploaded_by: Set(file.uploaded_by.0),
            is_public: Set(file.is_public),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        version_model(version, true)
            .insert(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(created.into())
    }

    async fn save(&self, file: &StoredFile) -> Result<StoredFile, DomainError> {
        let result = files::ActiveModel {
            id: Set(file.id.0),
            file_name: Set(file.file_name.clone()),
            original_name: Set(file.original_name.clone()),
            storage_path: Set(file.storage_path.clone()),
            file_size: Set(file.file_size),
            mime_type: Set(file.mime_type.clone()),
            description: Set(file.description.clone()),
            project_id: Set(file.project_id.map(|p| p.0)),
            task_id: Set(file.task_id.map(|t| t.0)),
            uploaded_by: Set(file.uploaded_by.0),
            is_public: Set(file.is_public),
            is_deleted: Set(file.is_deleted),
            created_at: Set(file.created_at.fixed_offset()),
            updated_at: Set(Utc::now().fixed_offset()),
        }
        .update(&self.db)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(result.into())
    }

    async fn versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>, DomainError> {
        let results = file_versions::Entity::find()
            .filter(file_versions::Column::FileId.eq(file_id.0))
            .order_by_desc(file_versions::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn add_version(&self, version: &NewFileVersion) -> Result<FileVersion, DomainError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        file_versions::Entity::update_many()
            .col_expr(file_versions::Column::IsCurrent, Expr::value(false))
            .filter(file_versions::Column::FileId.eq(version.file_id.0))
            .exec(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let created = version_model(version, true)
            .insert(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(created.into())
    }

    async fn set_current_version(
        &self,
        file_id: &FileId,
        version_id: &FileVersionId,
    ) -> Result<(), DomainError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        file_versions::Entity::update_many()
            .col_expr(file_versions::Column::IsCurrent, Expr::value(false))
            .filter(file_versions::Column::FileId.eq(file_id.0))
            .exec(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let result = file_versions::Entity::update_many()
            .col_expr(file_versions::Column::IsCurrent, Expr::value(true))
            .filter(file_versions::Column::FileId.eq(file_id.0))
            .filter(file_versions::Column::Id.eq(version_id.0))
            .exec(&txn)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            // dropping the transaction rolls it back
            return Err(DomainError::NotFound(format!(
                "Version {} not found",
                version_id
            )));
        }

        txn.commit()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(())
    }

    async fn permissions(&self, file_id: &FileId) -> Result<Vec<FilePermission>, DomainError> {
        let results = file_permissions::Entity::find()
            .filter(file_permissions::Column::FileId.eq(file_id.0))
            .order_by_asc(file_permissions::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn permissions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FilePermission>, DomainError> {
        let results = file_permissions::Entity::find()
            .filter(file_permissions::Column::UserId.eq(user_id.0))
            .filter(file_permissions::Column::IsActive.eq(true))
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn upsert_permission(
        &self,
        permission: &NewFilePermission,
    ) -> Result<FilePermission, DomainError> {
        let existing =
            file_permissions::Entity::find_by_id((permission.file_id.0, permission.user_id.0))
                .one(&self.db)
                .await
                .map_err(|e| DomainError::Database(e.to_string()))?;

        let expires_at = permission.expires_at.map(|t| t.fixed_offset());

        let result = match existing {
            Some(current) => {
                let mut active_model = current.into_active_model();
                active_model.level = Set(permission.level.to_string());
                active_model.granted_by = Set(permission.granted_by.0);
                active_model.expires_at = Set(expires_at);
                active_model.is_active = Set(true);
                active_model
                    .update(&self.db)
                    .await
                    .map_err(|e| DomainError::Database(e.to_string()))?
            }
            None => file_permissions::ActiveModel {
                file_id: Set(permission.file_id.0),
                user_id: Set(permission.user_id.0),
                level: Set(permission.level.to_string()),
                granted_by: Set(permission.granted_by.0),
                expires_at: Set(expires_at),
                is_active: Set(true),
                created_at: Set(Utc::now().fixed_offset()),
            }
            .insert(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?,
        };

        Ok(result.into())
    }

    async fn revoke_permission(
        &self,
        file_id: &FileId,
        user_id: &UserId,
    ) -> Result<(), DomainError> {
        let result = file_permissions::Entity::update_many()
            .col_expr(file_permissions::Column::IsActive, Expr::value(false))
            .filter(file_permissions::Column::FileId.eq(file_id.0))
            .filter(file_permissions::Column::UserId.eq(user_id.0))
            .filter(file_permissions::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("Permission not found".to_string()));
        }
        Ok(())
    }
}

/// Convert SeaORM model to domain entity
impl From<files::Model> for StoredFile {
    fn from(model: files::Model) -> Self {
        StoredFile {
            id: FileId(model.id),
            file_name: model.file_name,
            original_name: model.original_name,
            storage_path: model.storage_path,
            file_size: model.file_size,
            mime_type: model.mime_type,
            description: model.description,
            project_id: model.project_id.map(ProjectId),
            task_id: model.task_id.map(TaskId),
            uploaded_by: UserId(model.uploaded_by),
            is_public: model.is_public,
            is_deleted: model.is_deleted,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<file_versions::Model> for FileVersion {
    fn from(model: file_versions::Model) -> Self {
        FileVersion {
            id: FileVersionId(model.id),
            file_id: FileId(model.file_id),
            version_number: model.version_number,
            storage_path: model.storage_path,
            file_size: model.file_size,
            mime_type: model.mime_type,
            change_description: model.change_description,
            created_by: UserId(model.created_by),
            is_current: model.is_current,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<file_permissions::Model> for FilePermission {
    fn from(model: file_permissions::Model) -> Self {
        FilePermission {
            file_id: FileId(model.file_id),
            user_id: UserId(model.user_id),
            level: model.level.parse().unwrap_or(PermissionLevel::Read),
            granted_by: UserId(model.granted_by),
            expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
