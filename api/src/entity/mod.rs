//! SeaORM entity definitions
//!
//! One module per table. Column names match `migrations/`.

pub mod audit_logs;
pub mod comment_mentions;
pub mod comments;
pub mod file_permissions;
pub mod file_versions;
pub mod files;
pub mod milestone_dependencies;
pub mod milestones;
pub mod notification_preferences;
pub mod notifications;
pub mod project_team_members;
pub mod projects;
pub mod task_dependencies;
pub mod tasks;
pub mod time_entries;
pub mod users;
