//! Realtime client metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Client-level metrics counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    /// Transports constructed
    pub connections_opened: AtomicU64,
    /// Low-level connects that succeeded
    pub connections_established: AtomicU64,
    /// Low-level connects that failed or timed out
    pub connection_failures: AtomicU64,
    /// Registration messages sent
    pub registrations_sent: AtomicU64,
    /// Heartbeat pings answered
    pub heartbeats_answered: AtomicU64,
    /// Events handed to listeners
    pub events_dispatched: AtomicU64,
    /// Frames dropped as unknown or malformed
    pub frames_rejected: AtomicU64,
    /// Health checks run
    pub health_checks: AtomicU64,
    /// Forced reconnects performed by the health monitor
    pub reconnects: AtomicU64,
    /// Reconnect or re-mount attempts that failed
    pub reconnect_failures: AtomicU64,
}

impl RealtimeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transport construction
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful low-level connect
    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed low-level connect
    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a registration message
    pub fn registration_sent(&self) {
        self.registrations_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a heartbeat reply
    pub fn heartbeat_answered(&self) {
        self.heartbeats_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatched event
    pub fn event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected frame
    pub fn frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a health check
    pub fn health_check(&self) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a forced reconnect
    pub fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed recovery attempt
    pub fn reconnect_failed(&self) {
        self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            registrations_sent: self.registrations_sent.load(Ordering::Relaxed),
            heartbeats_answered: self.heartbeats_answered.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            health_checks: self.health_checks.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            reconnect_failures: self.reconnect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Transports constructed
    pub connections_opened: u64,
    /// Low-level connects that succeeded
    pub connections_established: u64,
    /// Low-level connects that failed or timed out
    pub connection_failures: u64,
    /// Registration messages sent
    pub registrations_sent: u64,
    /// Heartbeat pings answered
    pub heartbeats_answered: u64,
    /// Events handed to listeners
    pub events_dispatched: u64,
    /// Frames dropped as unknown or malformed
    pub frames_rejected: u64,
    /// Health checks run
    pub health_checks: u64,
    /// Forced reconnects performed by the health monitor
    pub reconnects: u64,
    /// Reconnect or re-mount attempts that failed
    pub reconnect_failures: u64,
}
