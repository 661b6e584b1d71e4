//! Chat message handler.

use std::sync::Arc;

use nestly_core::error::AppError;

use crate::connection::handle::Connection;
use crate::message::channel::Channel;
use crate::message::types::ServerEvent;
use crate::sink::ChatSink;

use super::{Disposer, HandlerFactory};

/// Forwards every `chat/message` envelope, untouched, to a [`ChatSink`].
#[derive(Debug, Clone)]
pub struct ChatHandler {
    sink: Arc<dyn ChatSink>,
}

impl ChatHandler {
    /// Create a handler feeding `sink`.
    pub fn new(sink: Arc<dyn ChatSink>) -> Self {
        Self { sink }
    }
}

impl HandlerFactory for ChatHandler {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
        let sink = Arc::clone(&self.sink);
        let id = connection.on(Channel::ChatMessage, move |event| {
            if let ServerEvent::ChatMessage(envelope) = event {
                sink.ingest_message(envelope.clone());
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
