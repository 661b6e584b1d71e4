//! Client identity and event sink configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Identity of the user the client runs for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Authenticated user identifier. When absent the client stays idle.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// In-memory event sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Maximum notifications retained by the feed; oldest are dropped.
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
    /// Maximum messages retained per conversation; oldest are dropped.
    #[serde(default = "default_max_messages_per_conversation")]
    pub max_messages_per_conversation: usize,
    /// Capacity of the broadcast channel each sink publishes to.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_notifications: default_max_notifications(),
            max_messages_per_conversation: default_max_messages_per_conversation(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl SinkConfig {
    /// Validate the sinks section.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_notifications == 0
            || self.max_messages_per_conversation == 0
            || self.feed_capacity == 0
        {
            return Err(AppError::configuration(
                "sinks.max_notifications, sinks.max_messages_per_conversation and sinks.feed_capacity must be positive",
            ));
        }
        Ok(())
    }
}

fn default_max_notifications() -> usize {
    200
}

fn default_max_messages_per_conversation() -> usize {
    500
}

fn default_feed_capacity() -> usize {
    256
}
