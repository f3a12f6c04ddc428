//! Domain entities
//!
//! Pure domain models representing core business concepts.
//! These are separate from the SeaORM entities in the `entity` module.

pub mod audit_log;
pub mod comment;
pub mod file;
pub mod milestone;
pub mod notification;
pub mod notification_preference;
pub mod pagination;
pub mod project;
pub mod task;
pub mod time_entry;
pub mod user;

pub use audit_log::{AuditAction, AuditFilter, AuditLog, AuditLogId, NewAuditLog};
pub use comment::{
    build_threads, validate_content, Comment, CommentEntityType, CommentId, CommentThread,
    NewComment,
};
pub use file::{
    file_extension, has_file_access, is_allowed_mime_type, next_version, sanitize_filename,
    FileAccessor, FileFilter, FileId, FilePermission, FileReader, FileUpdate, FileVersion,
    FileVersionId, NewFilePermission, NewFileVersion, NewStoredFile, PermissionLevel, StoredFile,
};
pub use milestone::{
    creates_milestone_cycle, validate_due_date, validate_milestone_name, Milestone,
    MilestoneDependency, MilestoneId, MilestoneStats, MilestoneUpdate, NewMilestone,
};
pub use notification::{NewNotification, Notification, NotificationId, NotificationType};
pub use notification_preference::{
    NotificationPreference, PreferenceSettings, PreferenceStats, PreferenceUpdate,
};
pub use pagination::{Page, PageRequest};
pub use project::{
    validate_project_fields, NewProject, Project, ProjectFilter, ProjectId, ProjectStatus,
    ProjectUpdate, TeamMember, DEFAULT_MEMBER_ROLE, MANAGER_MEMBER_ROLE,
};
pub use task::{
    creates_cycle, validate_task_fields, DependencyType, NewTask, Task, TaskDependency, TaskFilter,
    TaskId, TaskPriority, TaskStatus, TaskUpdate,
};
pub use time_entry::{
    validate_entry, NewTimeEntry, TimeCategory, TimeEntry, TimeEntryFilter, TimeEntryId,
    TimeEntryUpdate,
};
pub use user::{NewUser, ProfileUpdate, User, UserFilter, UserId, UserRole};
