//! Repository port traits
//!
//! These traits define the interface for data persistence.
//! Implementations are provided by adapters (e.g., PostgreSQL).

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::entities::{
    AuditFilter, AuditLog, AuditLogId, Comment, CommentEntityType, CommentId, DependencyType,
    FileFilter, FileId, FilePermission, FileVersion, FileVersionId, Milestone,
    MilestoneDependency, MilestoneId, NewAuditLog, NewComment, NewFilePermission, NewFileVersion,
    NewMilestone, NewNotification, NewProject, NewStoredFile, NewTask, NewTimeEntry, NewUser,
    Notification, NotificationId, NotificationPreference, NotificationType, Page, PageRequest,
    PreferenceSettings, ProfileUpdate, Project, ProjectFilter, ProjectId, StoredFile, Task,
    TaskDependency, TaskFilter, TaskId, TeamMember, TimeEntry, TimeEntryFilter, TimeEntryId, User,
    UserFilter, UserId, UserRole,
};
use crate::error::DomainError;

/// Repository for User entities
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Find a user by (lower-cased) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Load several users at once; unknown IDs are skipped
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, DomainError>;

    /// List users matching a filter
    async fn list(&self, filter: &UserFilter, page: PageRequest)
        -> Result<Page<User>, DomainError>;

    /// Create a new user
    async fn create(&self, user: &NewUser) -> Result<User, DomainError>;

    /// Apply self-service profile changes
    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, DomainError>;

    /// Change a user's role
    async fn update_role(&self, id: &UserId, role: UserRole) -> Result<User, DomainError>;

    /// Activate or deactivate a user
    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, DomainError>;

    /// Replace the stored password hash
    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError>;

    /// Record a successful login
    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError>;
}

/// Repository for Project entities and their team memberships
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, DomainError>;

    /// List projects matching a filter, newest first
    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, DomainError>;

    /// All projects matching a filter (used by reports and dashboards)
    async fn find_all(&self, filter: &ProjectFilter) -> Result<Vec<Project>, DomainError>;

    async fn create(&self, project: &NewProject) -> Result<Project, DomainError>;

    /// Persist every mutable field of the project
    async fn save(&self, project: &Project) -> Result<Project, DomainError>;

    /// Delete a project together with its tasks and memberships
    async fn delete(&self, id: &ProjectId) -> Result<(), DomainError>;

    /// All memberships of a project, including members who left
    async fn members(&self, id: &ProjectId) -> Result<Vec<TeamMember>, DomainError>;

    async fn find_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError>;

    /// Add a member, or reactivate a membership that was left
    async fn add_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: &str,
    ) -> Result<TeamMember, DomainError>;

    /// Mark a membership as left
    async fn remove_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<(), DomainError>;

    /// Projects where the user is an active member
    async fn project_ids_for_member(&self, user_id: &UserId)
        -> Result<Vec<ProjectId>, DomainError>;
}

/// Repository for Task entities and dependencies
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, DomainError>;

    async fn find_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>, DomainError>;

    /// List tasks matching a filter, newest first
    async fn list(&self, filter: &TaskFilter, page: PageRequest)
        -> Result<Page<Task>, DomainError>;

    /// All tasks matching a filter
    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>, DomainError>;

    async fn create(&self, task: &NewTask) -> Result<Task, DomainError>;

    /// Persist every mutable field of the task
    async fn save(&self, task: &Task) -> Result<Task, DomainError>;

    async fn delete(&self, id: &TaskId) -> Result<(), DomainError>;

    /// Overwrite the cached sum of logged hours
    async fn set_actual_hours(&self, id: &TaskId, hours: f64) -> Result<(), DomainError>;

    /// Prerequisites of a task
    async fn dependencies(&self, id: &TaskId) -> Result<Vec<TaskDependency>, DomainError>;

    /// Every dependency edge between tasks of a project
    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TaskDependency>, DomainError>;

    async fn add_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency, DomainError>;

    async fn remove_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<(), DomainError>;
}

/// Repository for Milestone entities and their dependencies
#[async_trait]
pub trait MilestoneRepository: Send + Sync {
    async fn find_by_id(&self, id: &MilestoneId) -> Result<Option<Milestone>, DomainError>;

    /// Milestones of a project by due date, optionally by completion
    async fn list_for_project(
        &self,
        project_id: &ProjectId,
        is_completed: Option<bool>,
    ) -> Result<Vec<Milestone>, DomainError>;

    async fn create(&self, milestone: &NewMilestone) -> Result<Milestone, DomainError>;

    /// Persist every mutable field of the milestone
    async fn save(&self, milestone: &Milestone) -> Result<Milestone, DomainError>;

    /// Delete a milestone and every dependency touching it
    async fn delete(&self, id: &MilestoneId) -> Result<(), DomainError>;

    /// Every dependency edge between milestones of a project
    async fn project_dependencies(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<MilestoneDependency>, DomainError>;

    async fn add_dependency(
        &self,
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<MilestoneDependency, DomainError>;

    async fn remove_dependency(
        &self,
        dependent_id: &MilestoneId,
        prerequisite_id: &MilestoneId,
    ) -> Result<(), DomainError>;
}

/// Repository for TimeEntry entities
#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, DomainError>;

    /// List entries matching a filter, most recent date first
    async fn list(
        &self,
        filter: &TimeEntryFilter,
        page: PageRequest,
    ) -> Result<Page<TimeEntry>, DomainError>;

    async fn find_all(&self, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>, DomainError>;

    /// Entry with the same user, project, task and date
    async fn find_duplicate(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        task_id: Option<&TaskId>,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>, DomainError>;

    async fn create(&self, entry: &NewTimeEntry) -> Result<TimeEntry, DomainError>;

    /// Persist every mutable field of the entry
    async fn save(&self, entry: &TimeEntry) -> Result<TimeEntry, DomainError>;

    async fn delete(&self, id: &TimeEntryId) -> Result<(), DomainError>;

    /// Sum of hours logged against a task
    async fn total_hours_for_task(&self, task_id: &TaskId) -> Result<f64, DomainError>;
}

/// Repository for file metadata, versions and permissions
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>, DomainError>;

    /// Non-deleted files matching a filter, newest first
    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<Page<StoredFile>, DomainError>;

    /// Create the file record and its initial version.
    /// The file takes its id from `version.file_id`.
    async fn create(
        &self,
        file: &NewStoredFile,
        version: &NewFileVersion,
    ) -> Result<StoredFile, DomainError>;

    /// Persist every mutable field of the file
    async fn save(&self, file: &StoredFile) -> Result<StoredFile, DomainError>;

    /// Versions of a file, newest first
    async fn versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>, DomainError>;

    /// Add a version and make it the only current one
    async fn add_version(&self, version: &NewFileVersion) -> Result<FileVersion, DomainError>;

    /// Make an existing version the only current one
    async fn set_current_version(
        &self,
        file_id: &FileId,
        version_id: &FileVersionId,
    ) -> Result<(), DomainError>;

    /// Grants on a file, including inactive ones
    async fn permissions(&self, file_id: &FileId) -> Result<Vec<FilePermission>, DomainError>;

    /// Active grants held by a user across all files
    async fn permissions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FilePermission>, DomainError>;

    /// Grant or replace a user's permission on a file
    async fn upsert_permission(
        &self,
        permission: &NewFilePermission,
    ) -> Result<FilePermission, DomainError>;

    /// Deactivate a user's permission on a file
    async fn revoke_permission(&self, file_id: &FileId, user_id: &UserId)
        -> Result<(), DomainError>;
}

/// Repository for Comment entities
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError>;

    /// Every comment on an entity, oldest first
    async fn list_for_entity(
        &self,
        entity_type: CommentEntityType,
        entity_id: &Uuid,
    ) -> Result<Vec<Comment>, DomainError>;

    async fn create(&self, comment: &NewComment) -> Result<Comment, DomainError>;

    /// Replace the content and mark the comment as edited
    async fn update_content(&self, id: &CommentId, content: &str)
        -> Result<Comment, DomainError>;

    /// Delete a comment and all replies below it
    async fn delete(&self, id: &CommentId) -> Result<(), DomainError>;
}

/// Repository for Notification entities
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification, DomainError>;

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, DomainError>;

    /// A user's notifications, newest first
    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, DomainError>;

    /// Every notification of a user (for statistics)
    async fn find_all_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, DomainError>;

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError>;

    /// Mark every unread notification of a user as read; returns how many changed
    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError>;

    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError>;

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError>;
}

/// Repository for per-user notification preferences, one row per type
#[async_trait]
pub trait NotificationPreferenceRepository: Send + Sync {
    /// A user's preferences ordered by type
    async fn list_for_user(&self, user_id: &UserId)
        -> Result<Vec<NotificationPreference>, DomainError>;

    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<NotificationPreference>, DomainError>;

    /// Fails with `AlreadyExists` when the user has a row for the type
    async fn create(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError>;

    /// Insert or overwrite the row for the type
    async fn upsert(
        &self,
        user_id: &UserId,
        settings: &PreferenceSettings,
    ) -> Result<NotificationPreference, DomainError>;

    async fn delete(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<(), DomainError>;
}

/// Repository for AuditLog entries (append-only)
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn create(&self, log: &NewAuditLog) -> Result<AuditLog, DomainError>;

    async fn find_by_id(&self, id: &AuditLogId) -> Result<Option<AuditLog>, DomainError>;

    /// Entries matching a filter, newest first
    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, DomainError>;

    async fn find_all(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError>;
}
