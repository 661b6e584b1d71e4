//! Transport seam between the connection driver and the network.
//!
//! A [`Connector`] turns a [`ConnectRequest`] into a pair of text-frame
//! sink and stream. [`ws::WsConnector`] speaks WebSocket over the network;
//! [`memory::MemoryConnector`] hands the server end to in-process code.

pub mod endpoint;
pub mod memory;
pub mod ws;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::Sink;

use nestly_core::config::RealtimeConfig;
use nestly_core::error::AppError;

pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use ws::WsConnector;

/// Outbound half of a transport: accepts serialized text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = AppError> + Send>>;

/// Inbound half of a transport: yields serialized text frames.
pub type FrameStream = BoxStream<'static, Result<String, AppError>>;

/// An established transport.
pub struct TransportPair {
    /// Frames to the server.
    pub sink: FrameSink,
    /// Frames from the server. Ends when the peer closes.
    pub stream: FrameStream,
}

impl fmt::Debug for TransportPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportPair").finish_non_exhaustive()
    }
}

/// Everything needed to open a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Fully-qualified `ws://` or `wss://` URL.
    pub url: String,
    /// Extra handshake headers (credentials, origin).
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Build the handshake request from configuration.
    ///
    /// Credentials are attached only when `with_credentials` is set.
    pub fn from_config(config: &RealtimeConfig) -> Result<Self, AppError> {
        let url = endpoint::websocket_url(&config.endpoint, &config.path)?;

        let mut headers = Vec::new();
        if config.with_credentials {
            if let Some(token) = &config.auth_token {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
            if let Some(cookie) = &config.cookie {
                headers.push(("Cookie".to_string(), cookie.clone()));
            }
            if let Some(origin) = &config.origin {
                headers.push(("Origin".to_string(), origin.clone()));
            }
        }

        Ok(Self { url, headers })
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Perform the low-level connect and handshake.
    async fn connect(&self, request: &ConnectRequest) -> Result<TransportPair, AppError>;
}
