//! JSON framing for realtime events.
//!
//! Every frame is a text message `{"event": "<channel>", "data": <payload>}`;
//! `data` is omitted for payload-less events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use nestly_core::error::AppError;

use super::channel::Channel;
use super::types::{ClientEvent, ServerEvent};
use super::validator;

/// Untyped wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Channel identifier.
    pub event: String,
    /// Payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl RawFrame {
    /// Build a frame for a channel.
    pub fn new(channel: Channel, data: Value) -> Self {
        Self {
            event: channel.as_str().to_string(),
            data,
        }
    }

    /// Channel this frame names, if known.
    pub fn channel(&self) -> Option<Channel> {
        Channel::from_wire(&self.event)
    }
}

/// Serialize a client event to a text frame.
pub fn encode_client_event(event: &ClientEvent) -> Result<String, AppError> {
    let data = match event {
        ClientEvent::Registration(payload) => serde_json::to_value(payload)?,
        ClientEvent::HeartbeatPong => Value::Null,
    };
    Ok(serde_json::to_string(&RawFrame::new(event.channel(), data))?)
}

/// Parse a text frame received from the server into a typed event.
///
/// Unknown channels and client-only channels are rejected so they are never
/// dispatched to a handler.
pub fn decode_server_frame(text: &str) -> Result<ServerEvent, AppError> {
    validator::validate_frame(text)?;

    let frame: RawFrame = serde_json::from_str(text)?;
    let channel = frame
        .channel()
        .ok_or_else(|| AppError::validation(format!("Unknown channel '{}'", frame.event)))?;

    let event = match channel {
        Channel::Connected => ServerEvent::Connected(frame.data),
        Channel::Disconnected => ServerEvent::Disconnected(frame.data),
        Channel::Notification => ServerEvent::Notification(serde_json::from_value(frame.data)?),
        Channel::ChatMessage => ServerEvent::ChatMessage(serde_json::from_value(frame.data)?),
        Channel::HeartbeatPing => ServerEvent::HeartbeatPing,
        Channel::Registration | Channel::HeartbeatPong => {
            return Err(AppError::validation(format!(
                "Channel '{channel}' is client-to-server only"
            )));
        }
    };

    Ok(event)
}
