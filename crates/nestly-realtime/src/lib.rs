//! # nestly-realtime
//!
//! Realtime client for the Nestly rental marketplace. Provides:
//!
//! - One shared WebSocket connection per client runtime, with registration
//!   handshake and heartbeat replies
//! - Pluggable event handlers (chat, notifications) mounted and disposed as
//!   a unit
//! - A health monitor that forces reconnection and re-mounts handlers when
//!   the connection drops
//! - In-memory event sinks for conversations and notifications

pub mod client;
pub mod connection;
pub mod handler;
pub mod health;
pub mod message;
pub mod metrics;
pub mod session;
pub mod sink;
pub mod transport;

pub use client::RealtimeClient;
pub use connection::manager::ConnectionManager;
pub use handler::{mount_handlers, Disposer, HandlerFactory, MountedHandlers};
pub use health::monitor::HealthMonitor;
pub use session::RealtimeSession;
