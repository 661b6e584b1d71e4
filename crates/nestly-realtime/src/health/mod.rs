//! Health monitor: periodic liveness check that rebuilds the connection
//! and re-mounts handlers when it has dropped.

pub mod backoff;
pub mod monitor;

pub use backoff::{CheckOutcome, CheckSchedule};
pub use monitor::{HealthMonitor, MonitorStats};
