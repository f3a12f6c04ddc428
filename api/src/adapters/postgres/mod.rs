//! PostgreSQL adapters
//!
//! Implementations of repository traits using SeaORM and PostgreSQL.

pub mod audit_repo;
pub mod comment_repo;
pub mod file_repo;
pub mod migrations;
pub mod milestone_repo;
pub mod notification_preference_repo;
pub mod notification_repo;
pub mod project_repo;
pub mod task_repo;
pub mod time_entry_repo;
pub mod user_repo;


pub use audit_repo::PostgresAuditLogRepository;
pub use comment_repo::PostgresCommentRepository;
pub use file_repo::PostgresFileRepository;
pub use migrations::run_migrations;
pub use milestone_repo::PostgresMilestoneRepository;
pub use notification_preference_repo::PostgresNotificationPreferenceRepository;
pub use notification_repo::PostgresNotificationRepository;
pub use project_repo::PostgresProjectRepository;
pub use task_repo::PostgresTaskRepository;
pub use time_entry_repo::PostgresTimeEntryRepository;
pub use user_repo::PostgresUserRepository;

/// `%term%` for ILIKE with the wildcard characters in `term` escaped
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("api"), "%api%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("c:\\tmp"), "%c:\\\\tmp%");
    }
}
