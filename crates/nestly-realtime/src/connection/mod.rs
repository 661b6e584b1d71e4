//! Client connection management: shared handle, background driver,
//! listener table, heartbeat replies.

pub mod driver;
pub mod handle;
pub mod heartbeat;
pub mod listeners;
pub mod manager;

pub use handle::{Connection, ConnectionId, ConnectionInfo, ConnectionState};
pub use listeners::ListenerId;
pub use manager::ConnectionManager;
