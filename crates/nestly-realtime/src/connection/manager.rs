//! Connection manager: owns the single shared connection of a client
//! runtime (ensure, health query, forced reconnect, close).

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use nestly_core::config::RealtimeConfig;
use nestly_core::error::AppError;
use nestly_core::types::UserId;

use crate::metrics::RealtimeMetrics;
use crate::transport::{ConnectRequest, Connector};

use super::driver::{self, DriverContext};
use super::handle::Connection;

/// Owns the one realtime connection per client runtime.
///
/// Other components never hold the slot; they go through
/// [`ensure_connection`](Self::ensure_connection),
/// [`force_reconnect`](Self::force_reconnect) and
/// [`close_connection`](Self::close_connection).
#[derive(Debug)]
pub struct ConnectionManager {
    /// Connection settings.
    config: RealtimeConfig,
    /// Opens transports.
    connector: Arc<dyn Connector>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// The shared connection, if any.
    slot: Mutex<Option<Arc<Connection>>>,
}

impl ConnectionManager {
    /// Creates a manager with no connection.
    pub fn new(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            config,
            connector,
            metrics,
            slot: Mutex::new(None),
        }
    }

    /// Returns the live connection for `user_id`, building one if needed.
    ///
    /// A connection that is connected or still connecting is reused, so
    /// repeated calls send a single registration. A closed connection, or
    /// one registered for another user, is replaced. The handshake runs in
    /// the background and is not awaited.
    pub fn ensure_connection(&self, user_id: &UserId) -> Result<Arc<Connection>, AppError> {
        let mut slot = self.slot();

        if let Some(existing) = slot.as_ref() {
            if !existing.is_closed() {
                if existing.user_id() == user_id {
                    return Ok(Arc::clone(existing));
                }
                info!(
                    conn_id = %existing.id,
                    previous_user = %existing.user_id(),
                    user_id = %user_id,
                    "Replacing realtime connection registered to another user"
                );
                existing.close();
            }
        }

        let connection = self.open(user_id)?;
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Whether the current connection reports itself connected.
    ///
    /// `false` before any connection exists.
    pub fn is_healthy(&self) -> bool {
        self.slot()
            .as_ref()
            .map(|conn| conn.is_connected())
            .unwrap_or(false)
    }

    /// Tears down any existing connection and builds a fresh one.
    pub fn force_reconnect(&self, user_id: &UserId) -> Result<Arc<Connection>, AppError> {
        let mut slot = self.slot();

        if let Some(old) = slot.take() {
            old.close();
            info!(conn_id = %old.id, user_id = %user_id, "Forcing realtime reconnect");
        }

        let connection = self.open(user_id)?;
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Tears down the connection and clears the slot. Idempotent.
    pub fn close_connection(&self) {
        if let Some(conn) = self.slot().take() {
            conn.close();
            info!(conn_id = %conn.id, user_id = %conn.user_id(), "Realtime connection closed");
        }
    }

    /// The current connection, whatever its state.
    pub fn current(&self) -> Option<Arc<Connection>> {
        self.slot().clone()
    }

    /// Connection settings.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Shared metrics.
    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.metrics
    }

    /// Build a connection and spawn its driver.
    fn open(&self, user_id: &UserId) -> Result<Arc<Connection>, AppError> {
        let request = ConnectRequest::from_config(&self.config)?;
        let connection = Arc::new(Connection::new(user_id.clone()));

        self.metrics.connection_opened();
        info!(
            conn_id = %connection.id,
            user_id = %user_id,
            url = %request.url,
            "Opening realtime connection"
        );

        tokio::spawn(driver::run(DriverContext {
            connection: Arc::clone(&connection),
            connector: Arc::clone(&self.connector),
            request,
            connect_timeout: self.config.connect_timeout(),
            metrics: Arc::clone(&self.metrics),
        }));

        Ok(connection)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
