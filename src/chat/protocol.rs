use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notifications::NotificationType;

// ── Client -> Server messages ──

/// A frame the client sends on a room socket.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub message: String,
}

// ── Server -> Client messages ──

/// Frames pushed to connected clients. Also the bus payload, so it
/// round-trips through JSON when relayed across instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A message posted in a room.
    ChatMessage {
        message: String,
        sender_id: Uuid,
        timestamp: String,
        message_id: Uuid,
        room: Uuid,
        is_read: bool,
    },
    /// Room list preview for the receiving user.
    RoomUpdate {
        room: Uuid,
        sender_id: Uuid,
        last_message: String,
        timestamp: String,
    },
    /// A persisted notification.
    Notification {
        id: Uuid,
        title: String,
        body: String,
        notification_type: NotificationType,
        url: Option<String>,
        created_at: String,
    },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
