//! WebSocket handlers
//!
//! Socket upgrades authenticate through `?token=`; the REST endpoints below
//! inspect and drive the hub and sit behind the bearer middleware.

use std::collections::HashMap;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::Response,
    Extension, Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::{ProjectId, User, UserId};
use crate::error::AppError;
use crate::realtime::{session, ConnectionInfo, SocketKind};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SocketStatus {
    pub total_connections: usize,
    pub connected_users: usize,
    pub channels: HashMap<String, usize>,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: HashMap<String, usize>,
    pub total_channels: usize,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub recipients: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub message_sent: Value,
}

/// Messages pushed through the REST endpoints must carry a `type`.
/// A missing `timestamp` is filled in with the send time.
fn typed_frame(mut body: Value) -> Result<(Value, String), AppError> {
    let Some(object) = body.as_object_mut() else {
        return Err(AppError::BadRequest(
            "Message must contain 'type' field".to_string(),
        ));
    };
    let has_type = object
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if !has_type {
        return Err(AppError::BadRequest(
            "Message must contain 'type' field".to_string(),
        ));
    }
    object.entry("timestamp").or_insert_with(|| {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true))
    });

    let frame = serde_json::to_string(&body).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((body, frame))
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("Admin role required"))
    }
}

fn require_manager(user: &User) -> Result<(), AppError> {
    if user.is_manager() {
        Ok(())
    } else {
        Err(AppError::forbidden("Manager role required"))
    }
}

/// GET /ws/notifications?token=...
pub async fn notifications_socket(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| session::run(socket, state, query.token, SocketKind::Notifications))
}

/// GET /ws/project/:project_id?token=...
pub async fn project_socket(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let kind = SocketKind::Project(ProjectId(project_id));
    ws.on_upgrade(move |socket| session::run(socket, state, query.token, kind))
}

/// GET /ws/chat/:project_id?token=...
pub async fn chat_socket(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let kind = SocketKind::Chat(ProjectId(project_id));
    ws.on_upgrade(move |socket| session::run(socket, state, query.token, kind))
}

/// GET /ws/status
pub async fn socket_status(State(state): State<AppState>) -> Json<SocketStatus> {
    let stats = state.hub.stats().await;
    Json(SocketStatus {
        total_connections: stats.total_connections,
        connected_users: stats.connected_users,
        channels: stats.channels,
        timestamp: Utc::now(),
    })
}

/// GET /ws/connections (managers)
pub async fn list_connections(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ConnectionInfo>>, AppError> {
    require_manager(&user)?;
    Ok(Json(state.hub.connections().await))
}

/// GET /ws/channels (managers)
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<ChannelsResponse>, AppError> {
    require_manager(&user)?;
    let channels = state.hub.stats().await.channels;
    Ok(Json(ChannelsResponse {
        total_channels: channels.len(),
        channels,
    }))
}

/// POST /ws/broadcast (admins)
///
/// Sends the body to every live socket.
pub async fn broadcast_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<Value>,
) -> Result<Json<DeliveryResponse>, AppError> {
    require_admin(&user)?;
    let (body, frame) = typed_frame(body)?;
    let recipients = state.hub.broadcast_all_raw(frame).await;
    tracing::info!(user_id = %user.id, recipients, "Broadcast sent");

    Ok(Json(DeliveryResponse {
        recipients,
        channel: None,
        user_id: None,
        message_sent: body,
    }))
}

/// POST /ws/broadcast/channel/:channel (admins)
pub async fn broadcast_channel(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(channel): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<DeliveryResponse>, AppError> {
    require_admin(&user)?;
    let (body, frame) = typed_frame(body)?;
    let recipients = state.hub.broadcast_channel_raw(&channel, frame).await;

    Ok(Json(DeliveryResponse {
        recipients,
        channel: Some(channel),
        user_id: None,
        message_sent: body,
    }))
}

/// POST /ws/notify/:user_id (admins)
///
/// Pushes the body to the user's sockets without storing a notification.
pub async fn notify_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<DeliveryResponse>, AppError> {
    require_admin(&user)?;
    let (body, frame) = typed_frame(body)?;
    let target = UserId(user_id);
    let recipients = state.hub.send_to_user_raw(&target, frame).await;

    Ok(Json(DeliveryResponse {
        recipients,
        channel: None,
        user_id: Some(target),
        message_sent: body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_frame_requires_type() {
        assert!(typed_frame(json!({"type": "announcement", "text": "hi"})).is_ok());
        assert!(typed_frame(json!({"text": "hi"})).is_err());
        assert!(typed_frame(json!({"type": ""})).is_err());
        assert!(typed_frame(json!(["type"])).is_err());
    }

    #[test]
    fn test_typed_frame_stamps_missing_timestamp() {
        let (body, frame) = typed_frame(json!({"type": "announcement"})).unwrap();
        let stamped = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());

        let sent: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(sent, body);
    }

    #[test]
    fn test_typed_frame_keeps_caller_timestamp() {
        let (body, _) =
            typed_frame(json!({"type": "announcement", "timestamp": "2024-05-01T09:00:00Z"}))
                .unwrap();
        assert_eq!(body["timestamp"], "2024-05-01T09:00:00Z");
    }
}
