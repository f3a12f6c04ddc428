//! Adapters layer
//!
//! Implementations of port traits for external systems.

pub mod postgres;
pub mod storage;

pub use postgres::{
    run_migrations, PostgresAuditLogRepository, PostgresCommentRepository, PostgresFileRepository,
    PostgresMilestoneRepository, PostgresNotificationPreferenceRepository,
    PostgresNotificationRepository, PostgresProjectRepository, PostgresTaskRepository,
    PostgresTimeEntryRepository, PostgresUserRepository,
};
pub use storage::LocalFileStorage;
