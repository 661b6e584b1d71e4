//! In-memory notification feed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use nestly_core::config::SinkConfig;

use crate::message::types::NotificationEnvelope;

use super::NotificationSink;

/// A notification as held by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNotification {
    /// When the client received it.
    pub received_at: DateTime<Utc>,
    /// Whether the user has seen it.
    pub read: bool,
    /// Envelope as delivered.
    pub envelope: NotificationEnvelope,
}

/// Bounded notification list, newest last.
#[derive(Debug)]
pub struct NotificationFeed {
    entries: Mutex<VecDeque<StoredNotification>>,
    max_entries: usize,
    feed: broadcast::Sender<NotificationEnvelope>,
}

impl NotificationFeed {
    /// Create an empty feed.
    pub fn new(config: &SinkConfig) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: config.max_notifications.max(1),
            feed,
        }
    }

    /// Receive every notification as it is ingested.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEnvelope> {
        self.feed.subscribe()
    }

    /// Copy of the retained notifications, oldest first.
    pub fn notifications(&self) -> Vec<StoredNotification> {
        self.entries().iter().cloned().collect()
    }

    /// Notifications not yet marked read.
    pub fn unread_count(&self) -> usize {
        self.entries().iter().filter(|n| !n.read).count()
    }

    /// Mark every retained notification as read.
    pub fn mark_all_read(&self) {
        for entry in self.entries().iter_mut() {
            entry.read = true;
        }
    }

    /// Retained notification count.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every notification (logout).
    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<StoredNotification>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NotificationSink for NotificationFeed {
    fn ingest_notification(&self, envelope: NotificationEnvelope) {
        {
            let mut entries = self.entries();
            while entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(StoredNotification {
                received_at: Utc::now(),
                read: false,
                envelope: envelope.clone(),
            });
        }

        trace!(kind = %envelope.kind, "Notification stored");
        let _ = self.feed.send(envelope);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notification(kind: &str) -> NotificationEnvelope {
        serde_json::from_value(json!({ "type": kind, "data": { "bookingId": "b1" } })).unwrap()
    }

    fn feed(max: usize) -> NotificationFeed {
        NotificationFeed::new(&SinkConfig {
            max_notifications: max,
            feed_capacity: 4,
            ..SinkConfig::default()
        })
    }

    #[test]
    fn test_appends_in_arrival_order() {
        let feed = feed(10);
        feed.ingest_notification(notification("booking.confirmed"));
        feed.ingest_notification(notification("bill.due"));

        let kinds: Vec<_> = feed
            .notifications()
            .into_iter()
            .map(|n| n.envelope.kind)
            .collect();
        assert_eq!(kinds, vec!["booking.confirmed", "bill.due"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let feed = feed(2);
        feed.ingest_notification(notification("a"));
        feed.ingest_notification(notification("b"));
        feed.ingest_notification(notification("c"));

        let kinds: Vec<_> = feed
            .notifications()
            .into_iter()
            .map(|n| n.envelope.kind)
            .collect();
        assert_eq!(kinds, vec!["b", "c"]);
    }

    #[test]
    fn test_mark_all_read() {
        let feed = feed(10);
        feed.ingest_notification(notification("a"));
        feed.mark_all_read();
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.len(), 1);

        feed.clear();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_envelope() {
        let feed = feed(10);
        let mut rx = feed.subscribe();
        feed.ingest_notification(notification("a"));
        assert_eq!(rx.recv().await.unwrap().kind, "a");
    }
}
