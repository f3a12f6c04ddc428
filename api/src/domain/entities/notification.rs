//! Notification domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Unique identifier for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for NotificationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a user is being notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    Mention,
    CommentAdded,
    TimeEntryApproved,
    TimeEntryRejected,
    ProjectUpdate,
    MilestoneReached,
    System,
}

impl NotificationType {
    pub const ALL: [NotificationType; 8] = [
        NotificationType::TaskAssigned,
        NotificationType::Mention,
        NotificationType::CommentAdded,
        NotificationType::TimeEntryApproved,
        NotificationType::TimeEntryRejected,
        NotificationType::ProjectUpdate,
        NotificationType::MilestoneReached,
        NotificationType::System,
    ];
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::TaskAssigned => write!(f, "task_assigned"),
            NotificationType::Mention => write!(f, "mention"),
            NotificationType::CommentAdded => write!(f, "comment_added"),
            NotificationType::TimeEntryApproved => write!(f, "time_entry_approved"),
            NotificationType::TimeEntryRejected => write!(f, "time_entry_rejected"),
            NotificationType::ProjectUpdate => write!(f, "project_update"),
            NotificationType::MilestoneReached => write!(f, "milestone_reached"),
            NotificationType::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task_assigned" => Ok(NotificationType::TaskAssigned),
            "mention" => Ok(NotificationType::Mention),
            "comment_added" => Ok(NotificationType::CommentAdded),
            "time_entry_approved" => Ok(NotificationType::TimeEntryApproved),
            "time_entry_rejected" => Ok(NotificationType::TimeEntryRejected),
            "project_update" => Ok(NotificationType::ProjectUpdate),
            "milestone_reached" => Ok(NotificationType::MilestoneReached),
            "system" => Ok(NotificationType::System),
            _ => Err(format!("Unknown notification type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(
        user_id: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    pub fn about(mut self, entity_type: &str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_entity() {
        let id = Uuid::new_v4();
        let n = NewNotification::new(UserId::new(), NotificationType::Mention, "t", "m")
            .about("task", id);
        assert_eq!(n.entity_type.as_deref(), Some("task"));
        assert_eq!(n.entity_id, Some(id));
    }

    #[test]
    fn type_round_trip() {
        for t in NotificationType::ALL {
            assert_eq!(t.to_string().parse::<NotificationType>().unwrap(), t);
        }
    }
}
