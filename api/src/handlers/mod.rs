//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod comments;
pub mod context;
pub mod files;
pub mod milestones;
pub mod notification_preferences;
pub mod notifications;
pub mod projects;
pub mod reports;
pub mod tasks;
pub mod time_entries;
pub mod users;
pub mod websocket;

pub use analytics::{dashboard, project_analytics};
pub use audit::{audit_stats, get_audit_log, list_audit_logs};
pub use auth::{change_password, login, logout, me, refresh, register};
pub use comments::{create_comment, delete_comment, list_comments, update_comment};
pub use context::RequestContext;
pub use files::{
    delete_file, download_file, get_file, grant_permission, list_files, list_permissions,
    list_versions, revoke_permission, rollback_version, update_file, upload_file, upload_version,
};
pub use milestones::{
    add_milestone_dependency, create_milestone, delete_milestone, get_milestone, list_milestones,
    milestone_stats, remove_milestone_dependency, update_milestone,
};
pub use notification_preferences::{
    bulk_update_preferences, create_default_preferences, create_preference, delete_preference,
    list_preferences, preference_stats, update_preference,
};
pub use notifications::{
    delete_notification, list_notifications, mark_all_read, mark_read, notification_stats,
    unread_count,
};
pub use projects::{
    add_member, create_project, delete_project, get_project, list_members, list_projects,
    remove_member, update_project,
};
pub use reports::{project_report, time_report, user_performance};
pub use tasks::{
    add_dependency, assign_task, create_task, delete_task, get_task, list_dependencies,
    list_tasks, remove_dependency, task_statistics, update_task, update_task_status,
};
pub use time_entries::{
    approve_entry, create_entry, delete_entry, entry_statistics, get_entry, list_entries,
    pending_entries, reject_entry, update_entry,
};
pub use users::{activate_user, deactivate_user, get_me, get_user, list_users, update_me, update_role};
pub use websocket::{
    broadcast_all, broadcast_channel, chat_socket, list_channels, list_connections,
    notifications_socket, notify_user, project_socket, socket_status,
};
