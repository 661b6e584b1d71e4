//! Session facade: realtime activity scoped to one signed-in user.

use std::sync::Arc;

use tracing::{debug, info};

use nestly_core::error::AppError;
use nestly_core::types::UserId;

use crate::connection::manager::ConnectionManager;
use crate::handler::{mount_handlers, HandlerFactory};
use crate::health::{HealthMonitor, MonitorStats};

/// Handlers and health monitor for one user, alive until deactivated or
/// dropped.
#[derive(Debug)]
pub struct RealtimeSession {
    monitor: HealthMonitor,
}

impl RealtimeSession {
    /// Mount `factories` for `user_id` and start the health monitor.
    ///
    /// A blank `user_id` means nobody is signed in: `Ok(None)` is returned
    /// without opening a connection or arming a timer. A handler that fails
    /// to attach fails the activation.
    pub fn activate(
        manager: Arc<ConnectionManager>,
        user_id: &str,
        factories: Vec<Arc<dyn HandlerFactory>>,
    ) -> Result<Option<Self>, AppError> {
        if user_id.trim().is_empty() {
            debug!("No signed-in user, realtime stays idle");
            return Ok(None);
        }
        let user_id = UserId::parse(user_id)?;

        let mounted = mount_handlers(&manager, &user_id, &factories)?;
        info!(
            user_id = %user_id,
            conn_id = %mounted.connection_id(),
            handlers = mounted.len(),
            "Realtime session activated"
        );

        let config = manager.config().clone();
        let monitor = HealthMonitor::start(manager, user_id, factories, mounted, &config);
        Ok(Some(Self { monitor }))
    }

    /// User this session belongs to.
    pub fn user_id(&self) -> &UserId {
        self.monitor.user_id()
    }

    /// Health monitor counters.
    pub fn monitor_stats(&self) -> MonitorStats {
        self.monitor.stats()
    }

    /// Stop the monitor and detach every handler.
    ///
    /// The connection itself stays open; closing it is a logout concern.
    pub async fn deactivate(self) {
        let user_id = self.monitor.user_id().clone();
        self.monitor.shutdown().await;
        info!(user_id = %user_id, "Realtime session deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RealtimeMetrics;
    use crate::transport::MemoryConnector;
    use nestly_core::config::RealtimeConfig;

    #[derive(Debug)]
    struct Failing;

    impl HandlerFactory for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn attach(
            &self,
            _connection: &Arc<crate::connection::handle::Connection>,
        ) -> Result<Option<crate::handler::Disposer>, AppError> {
            Err(AppError::handler("cannot attach"))
        }
    }

    fn manager() -> (Arc<ConnectionManager>, Arc<MemoryConnector>) {
        let (connector, _server) = MemoryConnector::pair();
        let connector = Arc::new(connector);
        let manager = Arc::new(ConnectionManager::new(
            RealtimeConfig::default(),
            connector.clone(),
            Arc::new(RealtimeMetrics::new()),
        ));
        (manager, connector)
    }

    #[tokio::test]
    async fn test_blank_user_is_a_no_op() {
        let (manager, connector) = manager();
        for id in ["", "   "] {
            let session = RealtimeSession::activate(Arc::clone(&manager), id, Vec::new()).unwrap();
            assert!(session.is_none());
        }
        assert!(manager.current().is_none());
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_attach_failure_propagates() {
        let (manager, _) = manager();
        let err = RealtimeSession::activate(manager, "u1", vec![Arc::new(Failing)]).unwrap_err();
        assert_eq!(err.message, "cannot attach");
    }

    #[tokio::test]
    async fn test_activate_then_deactivate() {
        let (manager, _) = manager();
        let session = RealtimeSession::activate(Arc::clone(&manager), "u1", Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id().as_str(), "u1");
        assert_eq!(session.monitor_stats().checks, 0);
        assert!(manager.current().is_some());

        session.deactivate().await;
        assert!(manager.current().is_some());
    }
}
