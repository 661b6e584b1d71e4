//! The per-session health check loop.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use nestly_core::config::RealtimeConfig;
use nestly_core::types::UserId;

use crate::connection::manager::ConnectionManager;
use crate::handler::{mount_handlers, HandlerFactory, MountedHandlers};

use super::backoff::{CheckOutcome, CheckSchedule};

/// Watches the shared connection for one user and drives recovery.
///
/// A single task sleeps, checks, and sleeps again, so there is never more
/// than one pending timer. Dropping the monitor stops it.
#[derive(Debug)]
pub struct HealthMonitor {
    shared: Arc<MonitorShared>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct MonitorShared {
    manager: Arc<ConnectionManager>,
    user_id: UserId,
    factories: Vec<Arc<dyn HandlerFactory>>,
    /// Latest mount; replaced after every forced reconnect.
    mounted: Mutex<Option<MountedHandlers>>,
    /// Cleared on stop. Checked before any reconnect or re-mount and after
    /// every mount.
    active: AtomicBool,
    cancel: CancellationToken,
    counters: MonitorCounters,
}

#[derive(Debug, Default)]
struct MonitorCounters {
    pending_timers: AtomicUsize,
    max_pending_timers: AtomicUsize,
    checks: AtomicU64,
    reconnects: AtomicU64,
    failures: AtomicU64,
}

/// Monitor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Timers currently armed (0 or 1).
    pub pending_timers: usize,
    /// Highest number of timers ever armed at once.
    pub max_pending_timers: usize,
    /// Checks run
    pub checks: u64,
    /// Forced reconnects
    pub reconnects: u64,
    /// Failed reconnects or re-mounts
    pub failures: u64,
}

impl HealthMonitor {
    /// Start monitoring. The first check runs one interval from now.
    ///
    /// `initial` is the mount made at activation; it is disposed on the
    /// first forced reconnect or when the monitor stops.
    pub fn start(
        manager: Arc<ConnectionManager>,
        user_id: UserId,
        factories: Vec<Arc<dyn HandlerFactory>>,
        initial: MountedHandlers,
        config: &RealtimeConfig,
    ) -> Self {
        let schedule = CheckSchedule::from_config(config);
        let shared = Arc::new(MonitorShared {
            manager,
            user_id,
            factories,
            mounted: Mutex::new(Some(initial)),
            active: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            counters: MonitorCounters::default(),
        });

        info!(
            user_id = %shared.user_id,
            interval_secs = schedule.next_delay().as_secs(),
            backoff = config.backoff.enabled,
            "Health monitor started"
        );

        let task = tokio::spawn(run(Arc::clone(&shared), schedule));
        Self {
            shared,
            task: Some(task),
        }
    }

    /// User being monitored.
    pub fn user_id(&self) -> &UserId {
        &self.shared.user_id
    }

    /// Whether [`stop`](Self::stop) has not been called yet.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> MonitorStats {
        let c = &self.shared.counters;
        MonitorStats {
            pending_timers: c.pending_timers.load(Ordering::SeqCst),
            max_pending_timers: c.max_pending_timers.load(Ordering::SeqCst),
            checks: c.checks.load(Ordering::SeqCst),
            reconnects: c.reconnects.load(Ordering::SeqCst),
            failures: c.failures.load(Ordering::SeqCst),
        }
    }

    /// Cancel the pending timer and dispose the current mount. Idempotent.
    ///
    /// Waits for a check that is already running; a mount it made is
    /// disposed. No reconnect or re-mount happens after this returns.
    pub fn stop(&self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.cancel.cancel();
        if let Some(mounted) = self.shared.mounted().take() {
            mounted.dispose();
        }
        info!(user_id = %self.shared.user_id, "Health monitor stopped");
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl MonitorShared {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn mounted(&self) -> MutexGuard<'_, Option<MountedHandlers>> {
        self.mounted.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn arm(&self) {
        let pending = self.counters.pending_timers.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_pending_timers
            .fetch_max(pending, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.counters.pending_timers.fetch_sub(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.counters.failures.fetch_add(1, Ordering::SeqCst);
        self.manager.metrics().reconnect_failed();
    }

    /// One health check. Errors are logged and never escape.
    fn check(&self) -> CheckOutcome {
        self.counters.checks.fetch_add(1, Ordering::SeqCst);
        self.manager.metrics().health_check();

        if self.manager.is_healthy() {
            trace!(user_id = %self.user_id, "Realtime connection healthy");
            return CheckOutcome::Healthy;
        }
        // Held until the check ends, so `stop` returns only after it.
        let mut mounted = self.mounted();
        if !self.is_active() {
            return CheckOutcome::Skipped;
        }

        warn!(user_id = %self.user_id, "Realtime connection unhealthy, forcing reconnect");

        if let Err(e) = self.manager.force_reconnect(&self.user_id) {
            warn!(user_id = %self.user_id, error = %e, "Forced reconnect failed");
            self.record_failure();
            return CheckOutcome::Failed;
        }
        self.counters.reconnects.fetch_add(1, Ordering::SeqCst);
        self.manager.metrics().reconnect();

        if let Some(previous) = mounted.take() {
            previous.dispose();
        }
        if !self.is_active() {
            return CheckOutcome::Skipped;
        }

        match mount_handlers(&self.manager, &self.user_id, &self.factories) {
            Ok(fresh) if !self.is_active() => {
                debug!(user_id = %self.user_id, "Monitor stopped during re-mount, disposing");
                fresh.dispose();
                CheckOutcome::Skipped
            }
            Ok(fresh) => {
                debug!(
                    user_id = %self.user_id,
                    conn_id = %fresh.connection_id(),
                    handlers = fresh.len(),
                    "Handlers re-mounted after reconnect"
                );
                *mounted = Some(fresh);
                CheckOutcome::Recovered
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Re-mounting handlers failed");
                self.record_failure();
                CheckOutcome::Failed
            }
        }
    }
}

async fn run(shared: Arc<MonitorShared>, mut schedule: CheckSchedule) {
    loop {
        let delay = schedule.next_delay();

        shared.arm();
        let fired = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        };
        shared.disarm();

        if !fired || !shared.is_active() {
            break;
        }

        let outcome = shared.check();
        schedule.record(outcome);
    }

    debug!(user_id = %shared.user_id, "Health monitor loop exited");
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;
    use crate::connection::handle::ConnectionState;
    use crate::message::channel::Channel;
    use crate::metrics::RealtimeMetrics;
    use crate::transport::{Connector, MemoryConnector, MemoryServer};
    use nestly_core::error::AppError;

    use crate::connection::handle::Connection;
    use crate::handler::Disposer;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Debug)]
    struct ChatListener;

    impl HandlerFactory for ChatListener {
        fn name(&self) -> &'static str {
            "chat-listener"
        }

        fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            let id = connection.on(Channel::ChatMessage, |_| {})?;
            let conn = Arc::downgrade(connection);
            Ok(Some(Disposer::new(move || {
                if let Some(conn) = conn.upgrade() {
                    conn.off(id);
                }
            })))
        }
    }

    /// Attaches once, then fails on every re-mount.
    #[derive(Debug, Default)]
    struct FailsAfterFirst {
        calls: AtomicUsize,
    }

    impl HandlerFactory for FailsAfterFirst {
        fn name(&self) -> &'static str {
            "fails-after-first"
        }

        fn attach(&self, _connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Err(AppError::handler("attach failed"))
            }
        }
    }

    /// Blocks its second attach until released.
    #[derive(Debug)]
    struct GatedRemount {
        calls: AtomicUsize,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedRemount {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl HandlerFactory for GatedRemount {
        fn name(&self) -> &'static str {
            "gated-remount"
        }

        fn attach(&self, connection: &Arc<Connection>) -> Result<Option<Disposer>, AppError> {
            let disposer = ChatListener.attach(connection)?;
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                self.entered.wait();
                self.release.wait();
            }
            Ok(disposer)
        }
    }

    struct Fixture {
        manager: Arc<ConnectionManager>,
        connector: Arc<MemoryConnector>,
        server: MemoryServer,
        user: UserId,
    }

    fn fixture() -> Fixture {
        let (connector, server) = MemoryConnector::pair();
        let connector = Arc::new(connector);
        let manager = Arc::new(ConnectionManager::new(
            RealtimeConfig::default(),
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::new(RealtimeMetrics::new()),
        ));
        Fixture {
            manager,
            connector,
            server,
            user: UserId::parse("u1").unwrap(),
        }
    }

    fn start(fx: &Fixture, factories: Vec<Arc<dyn HandlerFactory>>) -> HealthMonitor {
        let mounted = mount_handlers(&fx.manager, &fx.user, &factories).unwrap();
        HealthMonitor::start(
            Arc::clone(&fx.manager),
            fx.user.clone(),
            factories,
            mounted,
            &RealtimeConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_connection_is_left_alone() {
        let mut fx = fixture();
        let monitor = start(&fx, vec![Arc::new(ChatListener)]);
        let _peer = fx.server.accept().await.unwrap();
        fx.manager
            .current()
            .unwrap()
            .wait_until_connected(WAIT)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(95)).await;

        let stats = monitor.stats();
        assert_eq!(stats.checks, 3);
        assert_eq!(stats.reconnects, 0);
        assert_eq!(stats.pending_timers, 1);
        assert_eq!(stats.max_pending_timers, 1);
        assert_eq!(fx.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_connection_is_rebuilt_and_remounted() {
        let mut fx = fixture();
        let monitor = start(&fx, vec![Arc::new(ChatListener)]);
        let peer = fx.server.accept().await.unwrap();
        let old = fx.manager.current().unwrap();
        old.wait_until_connected(WAIT).await.unwrap();

        peer.close();
        old.watch_state()
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(monitor.stats().checks, 0);

        let _new_peer = fx.server.accept().await.unwrap();
        let new = fx.manager.current().unwrap();
        new.wait_until_connected(WAIT).await.unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(old.listener_count(Channel::ChatMessage), 0);
        assert_eq!(new.listener_count(Channel::ChatMessage), 1);
        assert_eq!(monitor.stats().reconnects, 1);

        tokio::time::sleep(Duration::from_secs(35)).await;
        let stats = monitor.stats();
        assert_eq!(stats.checks, 2);
        assert_eq!(stats.reconnects, 1);
        assert!(fx.manager.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed_and_checks_continue() {
        let fx = fixture();
        fx.connector.refuse_connections(true);
        let monitor = start(&fx, vec![Arc::new(FailsAfterFirst::default())]);

        tokio::time::sleep(Duration::from_secs(65)).await;

        let stats = monitor.stats();
        assert_eq!(stats.checks, 2);
        assert_eq!(stats.reconnects, 2);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.max_pending_timers, 1);
        assert_eq!(fx.manager.metrics().snapshot().reconnect_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disposes_and_cancels() {
        let mut fx = fixture();
        let monitor = start(&fx, vec![Arc::new(ChatListener)]);
        let _peer = fx.server.accept().await.unwrap();
        let conn = fx.manager.current().unwrap();
        assert_eq!(conn.listener_count(Channel::ChatMessage), 1);

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());
        assert_eq!(conn.listener_count(Channel::ChatMessage), 0);

        conn.close();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(monitor.stats().checks, 0);
        assert_eq!(fx.connector.attempts(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_monitor() {
        let mut fx = fixture();
        let monitor = start(&fx, vec![Arc::new(ChatListener)]);
        let _peer = fx.server.accept().await.unwrap();
        let conn = fx.manager.current().unwrap();

        drop(monitor);
        assert_eq!(conn.listener_count(Channel::ChatMessage), 0);

        conn.close();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fx.connector.attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remount_finishing_after_stop_is_disposed() {
        let mut fx = fixture();
        let gate = Arc::new(GatedRemount::new());
        let monitor = Arc::new(start(&fx, vec![gate.clone() as Arc<dyn HandlerFactory>]));
        let _peer = fx.server.accept().await.unwrap();
        let first = fx.manager.current().unwrap();
        first.wait_until_connected(WAIT).await.unwrap();
        first.close();

        let shared = Arc::clone(&monitor.shared);
        let check = tokio::task::spawn_blocking(move || shared.check());
        let g = Arc::clone(&gate);
        tokio::task::spawn_blocking(move || g.entered.wait())
            .await
            .unwrap();

        // Re-mount is in progress on the new connection; stop from another thread.
        let stopping = Arc::clone(&monitor);
        let stop = tokio::task::spawn_blocking(move || stopping.stop());
        while monitor.is_active() {
            tokio::task::yield_now().await;
        }
        let g = Arc::clone(&gate);
        tokio::task::spawn_blocking(move || g.release.wait())
            .await
            .unwrap();

        assert_eq!(check.await.unwrap(), CheckOutcome::Skipped);
        stop.await.unwrap();

        let second = fx.manager.current().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.listener_count(Channel::ChatMessage), 0);
        assert_eq!(second.listener_count(Channel::ChatMessage), 0);
        assert!(monitor.shared.mounted().is_none());
        assert_eq!(monitor.stats().reconnects, 1);

        second.close();
        assert_eq!(monitor.shared.check(), CheckOutcome::Skipped);
        assert!(Arc::ptr_eq(&second, &fx.manager.current().unwrap()));
        assert_eq!(monitor.stats().reconnects, 1);
    }
}
