//! Real-time delivery port
//!
//! Services publish events through this trait without knowing about sockets.

use async_trait::async_trait;

use crate::domain::entities::{NewNotification, Notification, ProjectId, UserId};
use crate::error::DomainError;

/// Pushes events to connected clients
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// Deliver a notification to every live connection of a user.
    /// Returns the number of connections reached.
    async fn notify_user(&self, user_id: &UserId, notification: &Notification) -> usize;

    /// Broadcast a project event to subscribers of the project's channel
    async fn project_event(
        &self,
        project_id: &ProjectId,
        event: &str,
        data: serde_json::Value,
    ) -> usize;
}

/// Creates notifications on behalf of other services
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns `None` when the recipient muted in-app delivery for the type
    async fn notify(&self, notification: NewNotification)
        -> Result<Option<Notification>, DomainError>;
}
