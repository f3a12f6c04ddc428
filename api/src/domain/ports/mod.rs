//! Domain ports (traits)
//!
//! Port traits define interfaces that the domain layer requires.
//! Adapters provide concrete implementations of these traits.

pub mod realtime;
pub mod repositories;
pub mod storage;

pub use realtime::{Notifier, RealtimePublisher};
pub use repositories::{
    AuditLogRepository, CommentRepository, FileRepository, MilestoneRepository,
    NotificationPreferenceRepository, NotificationRepository, ProjectRepository, TaskRepository,
    TimeEntryRepository, UserRepository,
};
pub use storage::{ContentStream, FileStorage};
