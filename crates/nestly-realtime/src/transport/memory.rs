//! In-process transport for tests and offline diagnostics.
//!
//! [`MemoryConnector::pair`] returns the client-side connector and a
//! [`MemoryServer`] that receives one [`MemoryPeer`] per accepted connect.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;

use nestly_core::error::AppError;

use crate::message::channel::Channel;
use crate::message::serializer::RawFrame;

use super::{ConnectRequest, Connector, TransportPair};

/// Client-side connector backed by in-memory channels.
#[derive(Debug)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: AtomicBool,
    attempts: AtomicUsize,
}

/// Server side: yields a peer for every successful connect.
#[derive(Debug)]
pub struct MemoryServer {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Server end of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    request: ConnectRequest,
    to_client: mpsc::UnboundedSender<Result<String, AppError>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryConnector {
    /// Create a connector and the server that accepts its connections.
    pub fn pair() -> (Self, MemoryServer) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                peers: tx,
                refuse: AtomicBool::new(false),
                attempts: AtomicUsize::new(0),
            },
            MemoryServer { peers: rx },
        )
    }

    /// Make subsequent connects fail (simulates an unreachable endpoint).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connect attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<TransportPair, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.refuse.load(Ordering::SeqCst) {
            return Err(AppError::transport(format!(
                "Connection to '{}' refused",
                request.url
            )));
        }

        let (to_client, client_inbound) = mpsc::unbounded();
        let (client_outbound, from_client) = mpsc::unbounded();

        let peer = MemoryPeer {
            request: request.clone(),
            to_client,
            from_client,
        };
        self.peers
            .unbounded_send(peer)
            .map_err(|_| AppError::transport("In-memory server is gone"))?;

        let sink = client_outbound
            .sink_map_err(|e| AppError::transport(format!("In-memory send failed: {e}")));

        Ok(TransportPair {
            sink: Box::pin(sink),
            stream: client_inbound.boxed(),
        })
    }
}

impl MemoryServer {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.next().await
    }

    /// Take a pending connection without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.next().now_or_never().flatten()
    }
}

impl MemoryPeer {
    /// The handshake request the client sent.
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Send an event on a named channel.
    pub fn send_event(&self, channel: &str, data: Value) -> bool {
        let frame = RawFrame {
            event: channel.to_string(),
            data,
        };
        match serde_json::to_string(&frame) {
            Ok(text) => self.send_raw(text),
            Err(_) => false,
        }
    }

    /// Send a heartbeat ping.
    pub fn ping(&self) -> bool {
        self.send_event(Channel::HeartbeatPing.as_str(), Value::Null)
    }

    /// Send an arbitrary text frame.
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.to_client.unbounded_send(Ok(text.into())).is_ok()
    }

    /// Inject a transport error into the client stream.
    pub fn fail(&self, message: &str) -> bool {
        self.to_client
            .unbounded_send(Err(AppError::transport(message.to_string())))
            .is_ok()
    }

    /// Wait for the next frame from the client.
    ///
    /// Returns `None` once the client has closed its side.
    pub async fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            let text = self.from_client.next().await?;
            if let Ok(frame) = serde_json::from_str(&text) {
                return Some(frame);
            }
        }
    }

    /// Take a frame that is already queued, without waiting.
    pub fn try_next_frame(&mut self) -> Option<RawFrame> {
        let text = self.from_client.next().now_or_never().flatten()?;
        serde_json::from_str(&text).ok()
    }

    /// Close the server side; the client sees end-of-stream.
    pub fn close(self) {
        self.to_client.close_channel();
    }
}
