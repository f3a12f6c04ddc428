//! WebSocket message formats
//!
//! Every frame is a JSON object with a `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Notification, ProjectId, UserId};

pub const NOTIFICATIONS_CHANNEL: &str = "notifications";

const DEFAULT_NOTIFICATION_LIMIT: u64 = 10;

pub fn project_channel(project_id: &ProjectId) -> String {
    format!("project:{}", project_id)
}

pub fn chat_channel(project_id: &ProjectId) -> String {
    format!("chat:{}", project_id)
}

/// Project referenced by a `project:` or `chat:` channel name
pub fn scoped_project(channel: &str) -> Option<ProjectId> {
    let id = channel
        .strip_prefix("project:")
        .or_else(|| channel.strip_prefix("chat:"))?;
    id.parse().ok().map(ProjectId)
}

/// Whether a channel name requires project access
pub fn is_scoped_channel(channel: &str) -> bool {
    channel.starts_with("project:") || channel.starts_with("chat:")
}

fn default_notification_limit() -> u64 {
    DEFAULT_NOTIFICATION_LIMIT
}

/// Messages accepted from clients
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Heartbeat,
    Ping,
    Subscribe {
        #[serde(default)]
        channels: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        channels: Vec<String>,
    },
    NotificationRequest {
        #[serde(default = "default_notification_limit")]
        limit: u64,
    },
    StatusRequest {
        #[serde(default)]
        include_connection_count: bool,
    },
    ChatMessage {
        content: String,
    },
}

const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "heartbeat",
    "ping",
    "subscribe",
    "unsubscribe",
    "notification_request",
    "status_request",
    "chat_message",
];

/// Parse a text frame, producing the error text sent back on failure
pub fn parse_client_message(text: &str) -> Result<ClientMessage, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| "Invalid JSON format".to_string())?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    if !CLIENT_MESSAGE_TYPES.contains(&kind.as_str()) {
        return Err(format!("Unknown message type: {}", kind));
    }

    serde_json::from_value(value).map_err(|e| format!("Invalid {} message: {}", kind, e))
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectUpdate {
    pub event: String,
    pub project_id: ProjectId,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
}

/// Messages pushed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        connection_id: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Subscribed {
        channels: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Unsubscribed {
        channels: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Notifications {
        data: Vec<Notification>,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    Status {
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Notification {
        data: Notification,
        timestamp: DateTime<Utc>,
    },
    ProjectUpdate {
        data: ProjectUpdate,
        timestamp: DateTime<Utc>,
    },
    ChatMessage {
        data: ChatPayload,
        timestamp: DateTime<Utc>,
    },
    Broadcast {
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize server message");
            r#"{"type":"error","error":"Internal error"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_parse_known_messages() {
        assert_eq!(
            parse_client_message(r#"{"type":"ping"}"#),
            Ok(ClientMessage::Ping)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"subscribe","channels":["notifications"]}"#),
            Ok(ClientMessage::Subscribe {
                channels: vec!["notifications".to_string()]
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"notification_request"}"#),
            Ok(ClientMessage::NotificationRequest { limit: 10 })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_client_message("not json"),
            Err("Invalid JSON format".to_string())
        );
        assert_eq!(
            parse_client_message(r#"{"type":"dance"}"#),
            Err("Unknown message type: dance".to_string())
        );
        assert!(parse_client_message(r#"{"type":"chat_message"}"#).is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::error("Authentication failed").to_json()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "Authentication failed");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_channel_names() {
        let id = ProjectId(Uuid::new_v4());
        assert_eq!(scoped_project(&project_channel(&id)), Some(id));
        assert_eq!(scoped_project(&chat_channel(&id)), Some(id));
        assert_eq!(scoped_project(NOTIFICATIONS_CHANNEL), None);
        assert!(is_scoped_channel("chat:whatever"));
        assert!(!is_scoped_channel("general"));
    }
}
