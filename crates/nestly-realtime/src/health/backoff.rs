//! Delay between health checks.

use std::time::Duration;

use nestly_core::config::RealtimeConfig;

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Connection was healthy; nothing done.
    Healthy,
    /// Connection was rebuilt and handlers re-mounted.
    Recovered,
    /// Reconnect or re-mount failed.
    Failed,
    /// Monitor was stopped before acting.
    Skipped,
}

/// Computes the delay before the next check.
///
/// With backoff disabled the delay is always the base interval. With it
/// enabled, every unhealthy outcome doubles the delay up to the cap and a
/// healthy check resets it.
#[derive(Debug, Clone)]
pub struct CheckSchedule {
    base: Duration,
    max: Duration,
    enabled: bool,
    current: Duration,
}

impl CheckSchedule {
    /// Schedule with a fixed interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            base: interval,
            max: interval,
            enabled: false,
            current: interval,
        }
    }

    /// Schedule built from realtime configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        let base = config.health_check_interval();
        let max = Duration::from_secs(config.backoff.max_interval_seconds).max(base);
        Self {
            base,
            max,
            enabled: config.backoff.enabled,
            current: base,
        }
    }

    /// Delay before the next check.
    pub fn next_delay(&self) -> Duration {
        self.current
    }

    /// Feed back the outcome of the check that just ran.
    pub fn record(&mut self, outcome: CheckOutcome) {
        if !self.enabled {
            return;
        }
        match outcome {
            CheckOutcome::Healthy => self.current = self.base,
            CheckOutcome::Recovered | CheckOutcome::Failed => {
                self.current = self.current.saturating_mul(2).min(self.max);
            }
            CheckOutcome::Skipped => {}
        }
    }
}
