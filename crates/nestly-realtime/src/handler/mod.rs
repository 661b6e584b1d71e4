//! Handler registry: pluggable event consumers mounted on the shared
//! connection and disposed as a unit.

pub mod chat;
pub mod notification;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use nestly_core::error::AppError;
use nestly_core::types::UserId;

use crate::connection::handle::{Connection, ConnectionId};
use crate::connection::manager::ConnectionManager;

pub use chat::ChatHandler;
pub use notification::NotificationHandler;

/// Detaches whatever a handler attached.
#[must_use = "dropping a disposer leaves its listeners attached"]
pub struct Disposer(Box<dyn FnOnce() + Send>);

impl Disposer {
    /// Wrap a teardown closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Run the teardown.
    pub fn dispose(self) {
        (self.0)()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer")
    }
}

/// Attaches listeners to a live connection.
///
/// Called again after every forced reconnect, so each call must attach a
/// fresh set of listeners to the connection it is given.
pub trait HandlerFactory: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Attach listeners. `None` means nothing needs detaching.
    fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError>;
}

/// Aggregate disposer returned by [`mount_handlers`].
#[derive(Debug)]
#[must_use = "dropping mounted handlers leaves their listeners attached"]
pub struct MountedHandlers {
    connection_id: ConnectionId,
    disposers: Vec<(&'static str, Disposer)>,
}

impl MountedHandlers {
    /// Connection the handlers were attached to.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Number of collected disposers.
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    /// Whether no handler returned a disposer.
    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Detach every handler mounted by this call.
    pub fn dispose(self) {
        let connection_id = self.connection_id;
        for (name, disposer) in self.disposers {
            disposer.dispose();
            debug!(conn_id = %connection_id, handler = name, "Handler detached");
        }
    }
}

/// Obtain the connection for `user_id` and attach every factory to it.
///
/// If a factory fails, the handlers already attached by this call are
/// detached before the error is returned.
pub fn mount_handlers(
    manager: &ConnectionManager,
    user_id: &UserId,
    factories: &[Arc<dyn HandlerFactory>],
) -> Result<MountedHandlers, AppError> {
    let connection = manager.ensure_connection(user_id)?;

    let mut mounted = MountedHandlers {
        connection_id: connection.id,
        disposers: Vec::with_capacity(factories.len()),
    };

    for factory in factories {
        match factory.attach(&connection) {
            Ok(Some(disposer)) => mounted.disposers.push((factory.name(), disposer)),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    conn_id = %connection.id,
                    handler = factory.name(),
                    error = %e,
                    rolled_back = mounted.len(),
                    "Handler failed to attach"
                );
                mounted.dispose();
                return Err(e);
            }
        }
    }

    debug!(
        conn_id = %connection.id,
        user_id = %user_id,
        handlers = mounted.len(),
        "Handlers mounted"
    );
    Ok(mounted)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::message::channel::Channel;
    use crate::metrics::RealtimeMetrics;
    use crate::transport::{Connector, MemoryConnector};
    use nestly_core::config::RealtimeConfig;

    #[derive(Debug)]
    struct ConnectedListener;

    impl HandlerFactory for ConnectedListener {
        fn name(&self) -> &'static str {
            "connected"
        }

        fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            let id = connection.on(Channel::Connected, |_| {})?;
            let conn = Arc::downgrade(connection);
            Ok(Some(Disposer::new(move || {
                if let Some(conn) = conn.upgrade() {
                    conn.off(id);
                }
            })))
        }
    }

    #[derive(Debug, Default)]
    struct NoopHandler {
        calls: AtomicUsize,
    }

    impl HandlerFactory for NoopHandler {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn attach(&self, _connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[derive(Debug)]
    struct FailingHandler;

    impl HandlerFactory for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn attach(&self, _connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            Err(AppError::handler("boom"))
        }
    }

    fn manager() -> ConnectionManager {
        let (connector, _server) = MemoryConnector::pair();
        ConnectionManager::new(
            RealtimeConfig::default(),
            Arc::new(connector) as Arc<dyn Connector>,
            Arc::new(RealtimeMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_empty_disposers_are_skipped() {
        let manager = manager();
        let noop = Arc::new(NoopHandler::default());
        let factories: Vec<Arc<dyn HandlerFactory>> =
            vec![Arc::new(ConnectedListener), noop.clone()];

        let mounted = mount_handlers(&manager, &UserId::parse("u1").unwrap(), &factories).unwrap();
        assert_eq!(mounted.len(), 1);
        assert_eq!(noop.calls.load(Ordering::SeqCst), 1);

        let conn = manager.current().unwrap();
        assert_eq!(mounted.connection_id(), conn.id);
        assert_eq!(conn.listener_count(Channel::Connected), 1);

        mounted.dispose();
        assert_eq!(conn.listener_count(Channel::Connected), 0);
    }

    #[tokio::test]
    async fn test_failed_attach_rolls_back_and_propagates() {
        let manager = manager();
        let factories: Vec<Arc<dyn HandlerFactory>> =
            vec![Arc::new(ConnectedListener), Arc::new(FailingHandler)];

        let err = mount_handlers(&manager, &UserId::parse("u1").unwrap(), &factories).unwrap_err();
        assert_eq!(err.message, "boom");

        let conn = manager.current().unwrap();
        assert_eq!(conn.listener_count(Channel::Connected), 0);
    }
}
