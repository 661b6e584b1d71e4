//! Inbound and outbound realtime event definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nestly_core::types::{ConversationId, MessageId, UserId};

use super::channel::Channel;

/// Payload of a `chat/message` event.
///
/// Fields the client does not model are kept in `extra`, so the envelope
/// reaches the sink exactly as the server sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEnvelope {
    /// Sender.
    pub from_user_id: UserId,
    /// Recipient.
    pub to_user_id: UserId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Message body, opaque to the realtime layer.
    pub message: Value,
    /// Server-assigned message ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Server send time, as sent (RFC 3339 string or epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<Value>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `notify/event` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// Notification type tag (e.g. `booking.confirmed`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific data.
    #[serde(default)]
    pub data: Value,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of the `registration` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    /// User the connection belongs to.
    pub user_id: UserId,
}

/// Events sent by the server to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Connection acknowledged.
    Connected(Value),
    /// Server is dropping the client.
    Disconnected(Value),
    /// Notification delivery.
    Notification(NotificationEnvelope),
    /// Chat message delivery.
    ChatMessage(ChatMessageEnvelope),
    /// Liveness probe.
    HeartbeatPing,
}

impl ServerEvent {
    /// Channel this event arrived on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Connected(_) => Channel::Connected,
            Self::Disconnected(_) => Channel::Disconnected,
            Self::Notification(_) => Channel::Notification,
            Self::ChatMessage(_) => Channel::ChatMessage,
            Self::HeartbeatPing => Channel::HeartbeatPing,
        }
    }
}

/// Events sent by the client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Associates the connection with a user.
    Registration(RegistrationPayload),
    /// Reply to a heartbeat ping.
    HeartbeatPong,
}

impl ClientEvent {
    /// Build a registration event for a user.
    pub fn registration(user_id: &UserId) -> Self {
        Self::Registration(RegistrationPayload {
            user_id: user_id.clone(),
        })
    }

    /// Channel this event is sent on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Registration(_) => Channel::Registration,
            Self::HeartbeatPong => Channel::HeartbeatPong,
        }
    }
}
