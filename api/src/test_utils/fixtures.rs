//! Test fixtures
//!
//! Factory functions for creating test data with sensible defaults.
//! Each fixture function creates a valid entity that can be customized.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    Comment, CommentEntityType, CommentId, FileId, Milestone, MilestoneId, Notification,
    NotificationId, NotificationType, Project, ProjectId, ProjectStatus, StoredFile, Task, TaskId,
    TaskPriority, TaskStatus, TimeCategory, TimeEntry, TimeEntryId, User, UserId, UserRole,
};

/// Create a test user with default values
pub fn test_user() -> User {
    test_user_with_role(UserRole::Developer)
}

/// Create a test user with a specific role
pub fn test_user_with_role(role: UserRole) -> User {
    let id = UserId(Uuid::new_v4());
    User {
        id,
        email: format!("user-{}@example.com", &id.0.to_string()[..8]),
        first_name: "Test".to_string(),
        last_name: format!("{:?}", role),
        password_hash: "pbkdf2_sha256$1$00$00".to_string(),
        role,
        hourly_rate: Some(50.0),
        avatar_url: None,
        is_active: true,
        last_login_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create an active project managed by `manager`
pub fn test_project(manager: &UserId) -> Project {
    Project {
        id: ProjectId(Uuid::new_v4()),
        name: "Test Project".to_string(),
        description: Some("A project for tests".to_string()),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: None,
        budget: 10_000.0,
        actual_cost: 0.0,
        status: ProjectStatus::Active,
        manager_id: *manager,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create a todo task in `project`
pub fn test_task(project: &ProjectId, created_by: &UserId) -> Task {
    Task {
        id: TaskId(Uuid::new_v4()),
        project_id: *project,
        title: "Test task".to_string(),
        description: None,
        assignee_id: None,
        status: TaskStatus::Todo,
        priority: TaskPriority::Medium,
        estimated_hours: Some(8.0),
        actual_hours: 0.0,
        due_date: None,
        started_at: None,
        completed_at: None,
        created_by: *created_by,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create an unapproved entry logged today
pub fn test_time_entry(user: &UserId, project: &ProjectId, hours: f64) -> TimeEntry {
    TimeEntry {
        id: TimeEntryId(Uuid::new_v4()),
        user_id: *user,
        project_id: *project,
        task_id: None,
        hours,
        date: Utc::now().date_naive(),
        category: TimeCategory::Development,
        notes: None,
        is_approved: false,
        approved_by: None,
        approved_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create a private text file uploaded by `uploader`
pub fn test_stored_file(uploader: &UserId) -> StoredFile {
    let id = FileId(Uuid::new_v4());
    StoredFile {
        id,
        file_name: format!("{}.txt", id),
        original_name: "notes.txt".to_string(),
        storage_path: format!("2024/01/{}.txt", id),
        file_size: 5,
        mime_type: "text/plain".to_string(),
        description: None,
        project_id: None,
        task_id: None,
        uploaded_by: *uploader,
        is_public: false,
        is_deleted: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create a top-level comment on a task
pub fn test_comment(author: &UserId, task: &TaskId) -> Comment {
    Comment {
        id: CommentId(Uuid::new_v4()),
        content: "Looks good".to_string(),
        author_id: *author,
        entity_type: CommentEntityType::Task,
        entity_id: task.0,
        parent_comment_id: None,
        is_edited: false,
        mentions: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create an unread system notification
pub fn test_notification(user: &UserId) -> Notification {
    Notification {
        id: NotificationId(Uuid::new_v4()),
        user_id: *user,
        notification_type: NotificationType::System,
        title: "Hello".to_string(),
        message: "Welcome aboard".to_string(),
        entity_type: None,
        entity_id: None,
        is_read: false,
        read_at: None,
        created_at: Utc::now(),
    }
}

/// Create an open milestone due in two weeks
pub fn test_milestone(project: &ProjectId) -> Milestone {
    Milestone {
        id: MilestoneId(Uuid::new_v4()),
        project_id: *project,
        name: "Beta release".to_string(),
        description: None,
        due_date: Utc::now().date_naive() + chrono::Duration::days(14),
        is_completed: false,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
