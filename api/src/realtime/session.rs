//! Per-socket session loop
//!
//! Authenticates the socket from its query string, registers it with the
//! hub, then splits it into a writer task draining the outbound queue and a
//! reader loop answering client messages.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use super::protocol::{
    chat_channel, is_scoped_channel, parse_client_message, project_channel, scoped_project,
    ChatPayload, ClientMessage, ServerMessage, NOTIFICATIONS_CHANNEL,
};
use crate::domain::entities::{ProjectId, User};
use crate::AppState;

const MAX_CHAT_LENGTH: usize = 2000;
const MAX_NOTIFICATION_BATCH: u64 = 100;

/// Which endpoint a socket was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Notifications,
    Project(ProjectId),
    Chat(ProjectId),
}

impl SocketKind {
    /// Channel the socket is subscribed to on connect
    pub fn channel(&self) -> String {
        match self {
            SocketKind::Notifications => NOTIFICATIONS_CHANNEL.to_string(),
            SocketKind::Project(id) => project_channel(id),
            SocketKind::Chat(id) => chat_channel(id),
        }
    }

    fn project_id(&self) -> Option<ProjectId> {
        match self {
            SocketKind::Notifications => None,
            SocketKind::Project(id) | SocketKind::Chat(id) => Some(*id),
        }
    }
}

/// An authenticated, registered connection
pub struct Session {
    pub connection_id: String,
    pub user: User,
    pub kind: SocketKind,
}

/// Resolve the token (and project access) before the socket is registered
pub async fn authorize(
    state: &AppState,
    token: Option<&str>,
    kind: SocketKind,
) -> Result<User, &'static str> {
    let token = token.filter(|t| !t.is_empty()).ok_or("Authentication failed")?;
    let (user, _) = state
        .auth_service
        .authenticate(token)
        .await
        .map_err(|_| "Authentication failed")?;

    if let Some(project_id) = kind.project_id() {
        state
            .project_service
            .get(&user, &project_id)
            .await
            .map_err(|_| "Access denied to project")?;
    }
    Ok(user)
}

/// Drive one socket until either side closes it
pub async fn run(mut socket: WebSocket, state: AppState, token: Option<String>, kind: SocketKind) {
    let user = match authorize(&state, token.as_deref(), kind).await {
        Ok(user) => user,
        Err(reason) => {
            tracing::debug!(reason, "Rejected WebSocket connection");
            let _ = socket
                .send(Message::Text(ServerMessage::error(reason).to_json()))
                .await;
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: axum::extract::ws::close_code::POLICY,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = state.hub.connect(user.id, tx).await;
    state.hub.subscribe(&connection_id, &kind.channel()).await;

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let session = Session {
        connection_id,
        user,
        kind,
    };

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_text(&state, &session, &text).await {
                    state
                        .hub
                        .send_to_connection(&session.connection_id, &reply)
                        .await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, connection_id = %session.connection_id, "WebSocket read failed");
                break;
            }
        }
    }

    state.hub.disconnect(&session.connection_id).await;
    writer.abort();
}

/// Answer one text frame; `None` when the reply went out some other way
pub async fn handle_text(state: &AppState, session: &Session, text: &str) -> Option<ServerMessage> {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(error) => return Some(ServerMessage::error(error)),
    };
    let now = Utc::now();

    match message {
        ClientMessage::Heartbeat => Some(ServerMessage::Heartbeat { timestamp: now }),
        ClientMessage::Ping => Some(ServerMessage::Pong { timestamp: now }),
        ClientMessage::Subscribe { channels } => {
            let mut accepted = Vec::new();
            for channel in channels {
                if let Err(reason) = can_join(state, &session.user, &channel).await {
                    state
                        .hub
                        .send_to_connection(&session.connection_id, &ServerMessage::error(reason))
                        .await;
                    continue;
                }
                if state.hub.subscribe(&session.connection_id, &channel).await {
                    accepted.push(channel);
                }
            }
            Some(ServerMessage::Subscribed {
                channels: accepted,
                timestamp: now,
            })
        }
        ClientMessage::Unsubscribe { channels } => {
            for channel in &channels {
                state.hub.unsubscribe(&session.connection_id, channel).await;
            }
            Some(ServerMessage::Unsubscribed {
                channels,
                timestamp: now,
            })
        }
        ClientMessage::NotificationRequest { limit } => {
            let limit = limit.clamp(1, MAX_NOTIFICATION_BATCH);
            match state
                .notification_service
                .unread(&session.user.id, limit)
                .await
            {
                Ok(data) => Some(ServerMessage::Notifications {
                    count: data.len(),
                    data,
                    timestamp: now,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %session.user.id, "Failed to load notifications");
                    Some(ServerMessage::error("Failed to load notifications"))
                }
            }
        }
        ClientMessage::StatusRequest {
            include_connection_count,
        } => {
            let mut data = json!({
                "connection_id": session.connection_id,
                "user_id": session.user.id,
                "channels": state.hub.channels_of(&session.connection_id).await,
            });
            if include_connection_count {
                data["connection_count"] = json!(state.hub.stats().await.total_connections);
            }
            Some(ServerMessage::Status {
                data,
                timestamp: now,
            })
        }
        ClientMessage::ChatMessage { content } => {
            let SocketKind::Chat(project_id) = session.kind else {
                return Some(ServerMessage::error(
                    "Chat messages are only accepted on chat sockets",
                ));
            };
            let content = content.trim();
            if content.is_empty() || content.chars().count() > MAX_CHAT_LENGTH {
                return Some(ServerMessage::error(format!(
                    "Chat messages must be between 1 and {} characters",
                    MAX_CHAT_LENGTH
                )));
            }
            let message = ServerMessage::ChatMessage {
                data: ChatPayload {
                    project_id,
                    user_id: session.user.id,
                    user_name: session.user.full_name(),
                    content: content.to_string(),
                },
                timestamp: now,
            };
            state
                .hub
                .broadcast_channel(&chat_channel(&project_id), &message)
                .await;
            None
        }
    }
}

/// Project-scoped channels need access to the project
async fn can_join(state: &AppState, user: &User, channel: &str) -> Result<(), String> {
    if channel.trim().is_empty() {
        return Err("Channel name cannot be empty".to_string());
    }
    if !is_scoped_channel(channel) {
        return Ok(());
    }
    let project_id =
        scoped_project(channel).ok_or_else(|| format!("Invalid channel: {}", channel))?;
    state
        .project_service
        .get(user, &project_id)
        .await
        .map(|_| ())
        .map_err(|_| format!("Access denied to channel: {}", channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_utils::test_user;
    use sea_orm::DatabaseConnection;

    async fn session_in(
        state: &AppState,
        kind: SocketKind,
    ) -> (Session, mpsc::UnboundedReceiver<String>) {
        let user = test_user();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = state.hub.connect(user.id, tx).await;
        state.hub.subscribe(&connection_id, &kind.channel()).await;
        rx.recv().await;
        (
            Session {
                connection_id,
                user,
                kind,
            },
            rx,
        )
    }

    fn state() -> AppState {
        crate::build_state(Config::for_tests(), DatabaseConnection::Disconnected)
    }

    fn frame(message: &ServerMessage) -> serde_json::Value {
        serde_json::from_str(&message.to_json()).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_heartbeat() {
        let state = state();
        let (session, _rx) = session_in(&state, SocketKind::Notifications).await;

        let pong = handle_text(&state, &session, r#"{"type":"ping"}"#).await.unwrap();
        assert_eq!(frame(&pong)["type"], "pong");
        let beat = handle_text(&state, &session, r#"{"type":"heartbeat"}"#).await.unwrap();
        assert_eq!(frame(&beat)["type"], "heartbeat");
    }

    #[tokio::test]
    async fn test_bad_frames_get_errors() {
        let state = state();
        let (session, _rx) = session_in(&state, SocketKind::Notifications).await;

        let reply = handle_text(&state, &session, "{nope").await.unwrap();
        assert_eq!(frame(&reply)["error"], "Invalid JSON format");
        let reply = handle_text(&state, &session, r#"{"type":"wave"}"#).await.unwrap();
        assert_eq!(frame(&reply)["error"], "Unknown message type: wave");
    }

    #[tokio::test]
    async fn test_subscribe_skips_forbidden_channels() {
        let state = state();
        let (session, mut rx) = session_in(&state, SocketKind::Notifications).await;

        let text = json!({
            "type": "subscribe",
            "channels": ["general", "project:not-a-uuid", ""],
        })
        .to_string();
        let reply = handle_text(&state, &session, &text).await.unwrap();

        assert_eq!(frame(&reply)["channels"], json!(["general"]));
        let error: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(error["error"], "Invalid channel: project:not-a-uuid");
        let error: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(
            state.hub.channels_of(&session.connection_id).await,
            vec!["general".to_string(), "notifications".to_string()]
        );

        let reply = handle_text(
            &state,
            &session,
            r#"{"type":"unsubscribe","channels":["general"]}"#,
        )
        .await
        .unwrap();
        assert_eq!(frame(&reply)["type"], "unsubscribed");
        assert_eq!(
            state.hub.channels_of(&session.connection_id).await,
            vec!["notifications".to_string()]
        );
    }

    #[tokio::test]
    async fn test_status_reports_connection_count() {
        let state = state();
        let (session, _rx) = session_in(&state, SocketKind::Notifications).await;

        let reply = handle_text(
            &state,
            &session,
            r#"{"type":"status_request","include_connection_count":true}"#,
        )
        .await
        .unwrap();
        let json = frame(&reply);
        assert_eq!(json["data"]["connection_count"], 1);
        assert_eq!(json["data"]["channels"], json!(["notifications"]));
    }

    #[tokio::test]
    async fn test_chat_only_on_chat_sockets() {
        let state = state();
        let project = ProjectId::new();
        let (plain, _rx1) = session_in(&state, SocketKind::Notifications).await;
        let (chat, mut rx2) = session_in(&state, SocketKind::Chat(project)).await;
        let message = r#"{"type":"chat_message","content":"  hello  "}"#;

        let reply = handle_text(&state, &plain, message).await.unwrap();
        assert_eq!(frame(&reply)["type"], "error");

        assert!(handle_text(&state, &chat, message).await.is_none());
        let pushed: serde_json::Value = serde_json::from_str(&rx2.recv().await.unwrap()).unwrap();
        assert_eq!(pushed["type"], "chat_message");
        assert_eq!(pushed["data"]["content"], "hello");
        assert_eq!(pushed["data"]["user_name"], chat.user.full_name());
    }

    #[tokio::test]
    async fn test_authorize_rejects_bad_tokens() {
        let state = state();
        assert_eq!(
            authorize(&state, None, SocketKind::Notifications).await.err(),
            Some("Authentication failed")
        );
        assert_eq!(
            authorize(&state, Some("garbage"), SocketKind::Notifications)
                .await
                .err(),
            Some("Authentication failed")
        );
    }
}
