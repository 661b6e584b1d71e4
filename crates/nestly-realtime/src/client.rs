//! Top-level client: the shared connection manager plus the stores its
//! handlers feed.

use std::sync::Arc;

use tracing::info;

use nestly_core::config::AppConfig;
use nestly_core::error::AppError;

use crate::connection::manager::ConnectionManager;
use crate::handler::{ChatHandler, HandlerFactory, NotificationHandler};
use crate::metrics::RealtimeMetrics;
use crate::session::RealtimeSession;
use crate::sink::{ConversationStore, NotificationFeed};
use crate::transport::{Connector, WsConnector};

/// Realtime client for one runtime.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    manager: Arc<ConnectionManager>,
    conversations: Arc<ConversationStore>,
    notifications: Arc<NotificationFeed>,
    metrics: Arc<RealtimeMetrics>,
}

impl RealtimeClient {
    /// Build a client that connects over WebSocket.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector::default()))
    }

    /// Build a client with a custom transport.
    pub fn with_connector(config: &AppConfig, connector: Arc<dyn Connector>) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let manager = Arc::new(ConnectionManager::new(
            config.realtime.clone(),
            connector,
            Arc::clone(&metrics),
        ));
        Self {
            manager,
            conversations: Arc::new(ConversationStore::new(&config.sinks)),
            notifications: Arc::new(NotificationFeed::new(&config.sinks)),
            metrics,
        }
    }

    /// Chat and notification handlers wired to this client's stores.
    pub fn handlers(&self) -> Vec<Arc<dyn HandlerFactory>> {
        vec![
            Arc::new(ChatHandler::new(self.conversations.clone())),
            Arc::new(NotificationHandler::new(self.notifications.clone())),
        ]
    }

    /// Start realtime activity for `user_id`. See [`RealtimeSession::activate`].
    pub fn activate(&self, user_id: &str) -> Result<Option<RealtimeSession>, AppError> {
        RealtimeSession::activate(Arc::clone(&self.manager), user_id, self.handlers())
    }

    /// Close the connection and drop all stored events.
    pub fn logout(&self) {
        self.manager.close_connection();
        self.conversations.clear();
        self.notifications.clear();
        info!("Realtime client logged out");
    }

    /// Shared connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Conversation store fed by the chat handler.
    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    /// Notification feed fed by the notification handler.
    pub fn notifications(&self) -> &Arc<NotificationFeed> {
        &self.notifications
    }

    /// Client metrics.
    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.metrics
    }
}
