//! Application layer
//!
//! Contains use cases and service orchestration.
//! Services coordinate between domain entities, ports, and external systems.

pub mod access;
pub mod analytics_service;
pub mod audit_service;
pub mod auth_service;
pub mod comment_service;
pub mod file_service;
pub mod milestone_service;
pub mod notification_preference_service;
pub mod notification_service;
pub mod project_service;
pub mod report_service;
pub mod task_service;
pub mod time_entry_service;
pub mod user_service;

pub use analytics_service::{AnalyticsService, Dashboard, ProjectAnalytics};
pub use audit_service::{AuditService, AuditStats};
pub use auth_service::{AuthService, RefreshedToken, Registration};
pub use comment_service::{CommentService, CreateComment};
pub use file_service::{FileService, UploadFile, UploadVersion};
pub use milestone_service::{CreateMilestone, MilestoneDetail, MilestoneService};
pub use notification_preference_service::NotificationPreferenceService;
pub use notification_service::{NotificationService, NotificationStats};
pub use project_service::{CreateProject, ProjectService};
pub use report_service::{
    GroupBy, ProjectReport, ReportService, TimeReport, TimeReportQuery, UserPerformance,
};
pub use task_service::{CreateTask, TaskService, TaskStatistics};
pub use time_entry_service::{CreateTimeEntry, TimeEntryService, TimeStatistics};
pub use user_service::UserService;

/// Round to two decimals for reporting
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
