//! WebSocket transport over tokio-tungstenite.
//!
//! Only the WebSocket transport is negotiated; there is no long-polling
//! fallback.

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use nestly_core::error::{AppError, ErrorKind};

use super::{ConnectRequest, Connector, TransportPair};

/// Connects to the realtime endpoint over the network.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    /// Create a new connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<TransportPair, AppError> {
        let mut ws_request = request.url.as_str().into_client_request().map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid realtime URL '{}': {e}", request.url),
                e,
            )
        })?;

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid header name '{name}'"),
                    e,
                )
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid value for header '{name}'"),
                    e,
                )
            })?;
            ws_request.headers_mut().insert(name, value);
        }

        let (ws_stream, response) = connect_async(ws_request).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Transport,
                format!("WebSocket connection to '{}' failed: {e}", request.url),
                e,
            )
        })?;

        debug!(url = %request.url, status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| {
                AppError::with_source(ErrorKind::Transport, format!("WebSocket send failed: {e}"), e)
            })
            .with(|text: String| future::ready(Ok::<_, AppError>(Message::Text(text.into()))));

        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    None
                }
                Ok(other) => {
                    trace!(kind = ?other, "Ignoring non-text WebSocket message");
                    None
                }
                Err(e) => Some(Err(AppError::with_source(
                    ErrorKind::Transport,
                    format!("WebSocket receive failed: {e}"),
                    e,
                ))),
            })
        });

        Ok(TransportPair {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}
