//! Event sinks: application stores fed by the realtime handlers.
//!
//! Handlers only see the [`ChatSink`] and [`NotificationSink`] traits;
//! [`ConversationStore`] and [`NotificationFeed`] are the in-memory stores
//! the client ships with.

pub mod conversation;
pub mod notification;

use std::fmt;

use crate::message::types::{ChatMessageEnvelope, NotificationEnvelope};

pub use conversation::{ConversationSnapshot, ConversationStore};
pub use notification::{NotificationFeed, StoredNotification};

/// Receives chat messages and merges them into conversation state.
pub trait ChatSink: Send + Sync + fmt::Debug {
    /// Ingest one inbound message.
    fn ingest_message(&self, envelope: ChatMessageEnvelope);
}

/// Receives notifications and appends them to a notification list.
pub trait NotificationSink: Send + Sync + fmt::Debug {
    /// Ingest one inbound notification.
    fn ingest_notification(&self, envelope: NotificationEnvelope);
}
