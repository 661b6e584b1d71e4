//! The shared client connection handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use nestly_core::error::AppError;
use nestly_core::types::UserId;

use crate::message::channel::Channel;
use crate::message::types::ServerEvent;

use super::heartbeat::HeartbeatTracker;
use super::listeners::{ListenerId, ListenerTable};

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Lifecycle of one transport instance.
///
/// `Disconnected` is terminal: recovery builds a new [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Connected, registration sent, answering heartbeats.
    Registered,
    /// Closed locally, dropped by the server, or never connected.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Registered => write!(f, "registered"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A handle to the single realtime connection.
///
/// The background driver owns the socket and every write to it; the handle
/// carries state and the listener table.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User the connection registers for
    user_id: UserId,
    /// Current lifecycle state
    state: watch::Sender<ConnectionState>,
    /// Handlers attached to this connection
    listeners: ListenerTable,
    /// Stops the driver
    cancel: CancellationToken,
    /// Heartbeat bookkeeping
    heartbeat: HeartbeatTracker,
    /// When the handle was created
    created_at: DateTime<Utc>,
}

impl Connection {
    /// Create a handle in the `Connecting` state.
    pub(crate) fn new(user_id: UserId) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            id: Uuid::new_v4(),
            user_id,
            state,
            listeners: ListenerTable::new(),
            cancel: CancellationToken::new(),
            heartbeat: HeartbeatTracker::new(),
            created_at: Utc::now(),
        }
    }

    /// User this connection is registered for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the transport reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Registered
    }

    /// Whether the connection has reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Disconnected
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the handshake resolves.
    ///
    /// Fails if the connection closes first or `timeout` elapses.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), AppError> {
        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| *s != ConnectionState::Connecting)
                .await
                .map(|s| *s)
        })
        .await
        .map_err(|_| AppError::transport(format!("Connection {} timed out", self.id)))?
        .map_err(|_| AppError::internal("Connection state channel closed"))?;

        match settled {
            ConnectionState::Registered => Ok(()),
            _ => Err(AppError::transport(format!(
                "Connection {} closed before registering",
                self.id
            ))),
        }
    }

    /// Attach a listener for an inbound channel.
    pub fn on<F>(&self, channel: Channel, listener: F) -> Result<ListenerId, AppError>
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        if !channel.is_inbound() {
            return Err(AppError::handler(format!(
                "Cannot listen on client-to-server channel '{channel}'"
            )));
        }
        Ok(self.listeners.add(channel, Arc::new(listener)))
    }

    /// Detach a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Listeners attached to a channel.
    pub fn listener_count(&self, channel: Channel) -> usize {
        self.listeners.count(channel)
    }

    /// Tear down the transport. Idempotent.
    pub fn close(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.cancel.cancel();
    }

    /// Heartbeat bookkeeping.
    pub fn heartbeat(&self) -> &HeartbeatTracker {
        &self.heartbeat
    }

    /// Move to a new state. Returns `false` once the connection is closed.
    pub(crate) fn set_state(&self, next: ConnectionState) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Disconnected {
                return false;
            }
            accepted = true;
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        accepted
    }

    /// Hand an inbound event to its listeners.
    pub(crate) fn dispatch(&self, event: &ServerEvent) -> usize {
        self.listeners.dispatch(event)
    }

    /// Token that stops the driver.
    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get a snapshot of connection info
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id.clone(),
            state: self.state(),
            created_at: self.created_at,
            last_heartbeat: self.heartbeat.last_ping(),
            heartbeats_answered: self.heartbeat.answered(),
            listeners: self.listeners.total(),
        }
    }
}

/// Snapshot of connection info (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// User ID
    pub user_id: UserId,
    /// State at snapshot time
    pub state: ConnectionState,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Last heartbeat answered
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Heartbeats answered
    pub heartbeats_answered: u64,
    /// Attached listeners
    pub listeners: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection::new(UserId::parse("u1").unwrap())
    }

    #[test]
    fn test_starts_connecting() {
        let conn = connection();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_closed_is_terminal() {
        let conn = connection();
        conn.close();
        assert!(conn.is_closed());
        assert!(!conn.set_state(ConnectionState::Registered));
        assert!(conn.is_closed());
        conn.close();
        assert!(conn.is_closed());
    }

    #[test]
    fn test_cannot_listen_on_outbound_channel() {
        let conn = connection();
        assert!(conn.on(Channel::HeartbeatPong, |_| {}).is_err());
        assert!(conn.on(Channel::ChatMessage, |_| {}).is_ok());
        assert_eq!(conn.listener_count(Channel::ChatMessage), 1);
    }

    #[test]
    fn test_info_reflects_state_and_listeners() {
        let conn = connection();
        conn.on(Channel::ChatMessage, |_| {}).unwrap();
        conn.on(Channel::Notification, |_| {}).unwrap();
        conn.set_state(ConnectionState::Registered);

        let info = conn.info();
        assert_eq!(info.id, conn.id);
        assert_eq!(info.user_id.as_str(), "u1");
        assert_eq!(info.state, ConnectionState::Registered);
        assert_eq!(info.listeners, 2);
        assert_eq!(info.heartbeats_answered, 0);
        assert!(info.last_heartbeat.is_none());

        conn.close();
        assert_eq!(conn.info().state.to_string(), "disconnected");
    }

    #[tokio::test]
    async fn test_wait_until_connected_resolves() {
        let conn = connection();
        conn.set_state(ConnectionState::Registered);
        assert!(conn
            .wait_until_connected(Duration::from_secs(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wait_until_connected_fails_when_closed() {
        let conn = connection();
        conn.close();
        assert!(conn
            .wait_until_connected(Duration::from_secs(1))
            .await
            .is_err());
    }
}
