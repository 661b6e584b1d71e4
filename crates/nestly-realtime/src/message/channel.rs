//! Named channels carried on the realtime connection.

use std::fmt;

/// Which side sends on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server.
    Outbound,
    /// Server to client.
    Inbound,
}

/// Fixed set of event discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Associates the transport with an authenticated user.
    Registration,
    /// Server acknowledgement after connect.
    Connected,
    /// Server notice before it drops the client.
    Disconnected,
    /// Notification delivery.
    Notification,
    /// Chat message delivery.
    ChatMessage,
    /// Server liveness probe.
    HeartbeatPing,
    /// Client reply to a liveness probe.
    HeartbeatPong,
}

impl Channel {
    /// All channels, in wire-table order.
    pub const ALL: [Channel; 7] = [
        Channel::Registration,
        Channel::Connected,
        Channel::Disconnected,
        Channel::Notification,
        Channel::ChatMessage,
        Channel::HeartbeatPing,
        Channel::HeartbeatPong,
    ];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Notification => "notify/event",
            Self::ChatMessage => "chat/message",
            Self::HeartbeatPing => "heartbeat-ping",
            Self::HeartbeatPong => "heartbeat-pong",
        }
    }

    /// Look up a channel by its wire identifier.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Direction of travel for this channel.
    pub fn direction(&self) -> Direction {
        match self {
            Self::Registration | Self::HeartbeatPong => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }

    /// Whether handlers may listen on this channel.
    pub fn is_inbound(&self) -> bool {
        self.direction() == Direction::Inbound
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
