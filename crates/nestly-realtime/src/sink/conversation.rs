//! In-memory conversation store.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use nestly_core::config::SinkConfig;
use nestly_core::types::{ConversationId, MessageId};

use crate::message::types::ChatMessageEnvelope;

use super::ChatSink;

/// Conversation state keyed by conversation ID.
///
/// Messages are kept in delivery order, at most `max_messages_per_conversation`
/// per conversation. A message whose `messageId` is already stored is
/// skipped, so a redelivery after reconnect does not duplicate it.
#[derive(Debug)]
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Conversation>,
    max_messages: usize,
    feed: broadcast::Sender<ChatMessageEnvelope>,
}

#[derive(Debug)]
struct Conversation {
    messages: VecDeque<ChatMessageEnvelope>,
    /// IDs of the messages currently held.
    seen: HashSet<MessageId>,
    unread: usize,
    last_activity: DateTime<Utc>,
}

impl Conversation {
    fn new(last_activity: DateTime<Utc>) -> Self {
        Self {
            messages: VecDeque::new(),
            seen: HashSet::new(),
            unread: 0,
            last_activity,
        }
    }

    fn snapshot(&self, conversation_id: ConversationId) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation_id,
            messages: self.messages.iter().cloned().collect(),
            unread: self.unread,
            last_activity: self.last_activity,
        }
    }
}

/// Read-only copy of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// Conversation ID.
    pub conversation_id: ConversationId,
    /// Messages in delivery order.
    pub messages: Vec<ChatMessageEnvelope>,
    /// Messages received since the last [`ConversationStore::mark_read`].
    pub unread: usize,
    /// Send time of the newest message, or its arrival time if unset.
    pub last_activity: DateTime<Utc>,
}

impl ConversationStore {
    /// Creates an empty store sized by the sink settings.
    pub fn new(config: &SinkConfig) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        Self {
            conversations: DashMap::new(),
            max_messages: config.max_messages_per_conversation.max(1),
            feed,
        }
    }

    /// Receive every message as it is ingested.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessageEnvelope> {
        self.feed.subscribe()
    }

    /// Snapshot of one conversation.
    pub fn conversation(&self, id: &ConversationId) -> Option<ConversationSnapshot> {
        self.conversations
            .get(id)
            .map(|entry| entry.snapshot(id.clone()))
    }

    /// Conversations ordered by most recent activity first.
    pub fn conversations(&self) -> Vec<ConversationSnapshot> {
        let mut all: Vec<ConversationSnapshot> = self
            .conversations
            .iter()
            .map(|entry| entry.snapshot(entry.key().clone()))
            .collect();
        all.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        all
    }

    /// Unread messages in one conversation.
    pub fn unread_count(&self, id: &ConversationId) -> usize {
        self.conversations
            .get(id)
            .map(|entry| entry.unread)
            .unwrap_or(0)
    }

    /// Unread messages across all conversations.
    pub fn total_unread(&self) -> usize {
        self.conversations.iter().map(|entry| entry.unread).sum()
    }

    /// Reset the unread counter of a conversation.
    pub fn mark_read(&self, id: &ConversationId) {
        if let Some(mut entry) = self.conversations.get_mut(id) {
            entry.unread = 0;
        }
    }

    /// Total messages stored.
    pub fn message_count(&self) -> usize {
        self.conversations
            .iter()
            .map(|entry| entry.messages.len())
            .sum()
    }

    /// Drop all state (logout).
    pub fn clear(&self) {
        self.conversations.clear();
    }
}

/// Reads `sentAt` as an RFC 3339 string or epoch milliseconds.
fn sent_time(sent_at: Option<&Value>) -> Option<DateTime<Utc>> {
    match sent_at? {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

impl ChatSink for ConversationStore {
    fn ingest_message(&self, envelope: ChatMessageEnvelope) {
        let arrived = sent_time(envelope.sent_at.as_ref()).unwrap_or_else(Utc::now);

        {
            let mut conversation = self
                .conversations
                .entry(envelope.conversation_id.clone())
                .or_insert_with(|| Conversation::new(arrived));

            if let Some(message_id) = &envelope.message_id {
                if !conversation.seen.insert(message_id.clone()) {
                    debug!(
                        conversation_id = %envelope.conversation_id,
                        message_id = %message_id,
                        "Skipping duplicate chat message"
                    );
                    return;
                }
            }

            conversation.messages.push_back(envelope.clone());
            if conversation.messages.len() > self.max_messages {
                if let Some(evicted) = conversation.messages.pop_front() {
                    if let Some(id) = &evicted.message_id {
                        conversation.seen.remove(id);
                    }
                }
            }
            conversation.unread = (conversation.unread + 1).min(conversation.messages.len());
            if arrived > conversation.last_activity {
                conversation.last_activity = arrived;
            }
        }

        trace!(conversation_id = %envelope.conversation_id, "Chat message stored");
        let _ = self.feed.send(envelope);
    }
}
