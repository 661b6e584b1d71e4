//! Heartbeat replies.
//!
//! The server owns liveness: it sends `heartbeat-ping` and judges the
//! client by the `heartbeat-pong` it gets back. The client replies once,
//! immediately, with no retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use nestly_core::error::AppError;

use crate::message::serializer;
use crate::message::types::ClientEvent;

/// Tracks pings seen on one connection.
#[derive(Debug, Default)]
pub struct HeartbeatTracker {
    last_ping: Mutex<Option<DateTime<Utc>>>,
    answered: AtomicU64,
}

impl HeartbeatTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a ping was answered.
    pub fn record_reply(&self) {
        *self.last_ping.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        self.answered.fetch_add(1, Ordering::Relaxed);
    }

    /// When the last ping was answered.
    pub fn last_ping(&self) -> Option<DateTime<Utc>> {
        *self.last_ping.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pings answered on this connection.
    pub fn answered(&self) -> u64 {
        self.answered.load(Ordering::Relaxed)
    }
}

/// Serialized `heartbeat-pong` frame.
pub fn pong_frame() -> Result<String, AppError> {
    serializer::encode_client_event(&ClientEvent::HeartbeatPong)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_records_replies() {
        let tracker = HeartbeatTracker::new();
        assert!(tracker.last_ping().is_none());

        tracker.record_reply();
        tracker.record_reply();
        assert_eq!(tracker.answered(), 2);
        assert!(tracker.last_ping().is_some());
    }
}
