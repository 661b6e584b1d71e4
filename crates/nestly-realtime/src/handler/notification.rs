//! Notification handler.

use std::sync::Arc;

use nestly_core::error::AppError;

use crate::connection::handle::Connection;
use crate::message::channel::Channel;
use crate::message::types::ServerEvent;
use crate::sink::NotificationSink;

use super::{Disposer, HandlerFactory};

/// Forwards every `notify/event` envelope to a [`NotificationSink`].
#[derive(Debug, Clone)]
pub struct NotificationHandler {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationHandler {
    /// Create a handler feeding `sink`.
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }
}

impl HandlerFactory for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
        let sink = Arc::clone(&self.sink);
        let id = connection.on(Channel::Notification, move |event| {
            if let ServerEvent::Notification(envelope) = event {
                sink.ingest_notification(envelope.clone());
            }
        })?;

        let conn = Arc::downgrade(connection);
        Ok(Some(Disposer::new(move || {
            if let Some(conn) = conn.upgrade() {
                conn.off(id);
            }
        })))
    }
}
