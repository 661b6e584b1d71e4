//! Shared helpers for realtime integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use nestly_core::config::AppConfig;
use nestly_core::types::UserId;
use nestly_realtime::message::types::{ChatMessageEnvelope, NotificationEnvelope};
use nestly_realtime::sink::{ChatSink, NotificationSink};
use nestly_realtime::transport::{MemoryConnector, MemoryPeer, MemoryServer};
use nestly_realtime::RealtimeClient;

/// Upper bound for waits that should resolve immediately.
pub const WAIT: Duration = Duration::from_secs(5);

/// A client wired to an in-memory server.
pub struct TestClient {
    /// Client under test
    pub client: RealtimeClient,
    /// Connector, for attempt counts and refusals
    pub connector: Arc<MemoryConnector>,
    /// Server end accepting connections
    pub server: MemoryServer,
}

impl TestClient {
    /// Create a client with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: AppConfig) -> Self {
        let (connector, server) = MemoryConnector::pair();
        let connector = Arc::new(connector);
        let client = RealtimeClient::with_connector(&config, connector.clone());
        Self {
            client,
            connector,
            server,
        }
    }

    /// Accept the next connection and consume its registration frame.
    pub async fn accept_registered(&mut self) -> MemoryPeer {
        let mut peer = self.server.accept().await.expect("server closed");
        let frame = peer.next_frame().await.expect("no registration frame");
        assert_eq!(frame.event, "registration");
        peer
    }
}

/// Round-trip a heartbeat so every frame sent before it has been dispatched.
pub async fn sync(peer: &mut MemoryPeer) {
    assert!(peer.ping());
    loop {
        let frame = peer.next_frame().await.expect("client closed");
        if frame.event == "heartbeat-pong" {
            return;
        }
    }
}

/// A `chat/message` payload.
pub fn chat_payload(from: &str, to: &str, conversation: &str, text: &str) -> Value {
    json!({
        "fromUserId": from,
        "toUserId": to,
        "conversationId": conversation,
        "message": { "text": text },
    })
}

/// A `notify/event` payload.
pub fn notification_payload(kind: &str) -> Value {
    json!({ "type": kind, "data": { "listingId": "l1" } })
}

/// Parse a user ID.
pub fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

/// Sink that records every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<ChatMessageEnvelope>>,
    pub notifications: Mutex<Vec<NotificationEnvelope>>,
}

impl RecordingSink {
    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

impl ChatSink for RecordingSink {
    fn ingest_message(&self, envelope: ChatMessageEnvelope) {
        self.messages.lock().unwrap().push(envelope);
    }
}

impl NotificationSink for RecordingSink {
    fn ingest_notification(&self, envelope: NotificationEnvelope) {
        self.notifications.lock().unwrap().push(envelope);
    }
}
