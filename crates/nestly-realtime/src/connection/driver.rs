//! Background task that owns the transport for one connection.
//!
//! Connects, sends the registration message, answers heartbeats, and
//! dispatches inbound events in transport order. There is no automatic
//! retry: when the transport ends the connection is marked disconnected and
//! recovery is left to the health monitor.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tracing::{debug, info, trace, warn};

use nestly_core::error::AppError;

use crate::message::serializer;
use crate::message::types::{ClientEvent, ServerEvent};
use crate::metrics::RealtimeMetrics;
use crate::transport::{ConnectRequest, Connector, FrameSink, TransportPair};

use super::handle::{Connection, ConnectionState};
use super::heartbeat;

/// Inputs for [`run`].
pub(crate) struct DriverContext {
    pub connection: Arc<Connection>,
    pub connector: Arc<dyn Connector>,
    pub request: ConnectRequest,
    pub connect_timeout: Duration,
    pub metrics: Arc<RealtimeMetrics>,
}

/// Drive a connection until it closes.
pub(crate) async fn run(ctx: DriverContext) {
    let DriverContext {
        connection,
        connector,
        request,
        connect_timeout,
        metrics,
    } = ctx;
    let cancel = connection.cancellation();

    let pair = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(conn_id = %connection.id, "Connection closed before transport was established");
            return;
        }
        result = tokio::time::timeout(connect_timeout, connector.connect(&request)) => match result {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(conn_id = %connection.id, url = %request.url, error = %e, "Realtime connect failed");
                metrics.connection_failed();
                connection.set_state(ConnectionState::Disconnected);
                return;
            }
            Err(_) => {
                warn!(
                    conn_id = %connection.id,
                    url = %request.url,
                    timeout_secs = connect_timeout.as_secs(),
                    "Realtime connect timed out"
                );
                metrics.connection_failed();
                connection.set_state(ConnectionState::Disconnected);
                return;
            }
        }
    };

    let TransportPair {
        mut sink,
        mut stream,
    } = pair;

    if !connection.set_state(ConnectionState::Registered) {
        let _ = sink.close().await;
        return;
    }
    metrics.connection_established();

    let registration = ClientEvent::registration(connection.user_id());
    if let Err(e) = send_event(&mut sink, &registration).await {
        warn!(conn_id = %connection.id, error = %e, "Failed to send registration");
        connection.set_state(ConnectionState::Disconnected);
        return;
    }
    metrics.registration_sent();

    info!(
        conn_id = %connection.id,
        user_id = %connection.user_id(),
        "Realtime connection registered"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                debug!(conn_id = %connection.id, "Realtime transport closed locally");
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(text)) => {
                    if let Err(e) = handle_frame(&connection, &text, &mut sink, &metrics).await {
                        warn!(conn_id = %connection.id, error = %e, "Heartbeat reply failed");
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(conn_id = %connection.id, error = %e, "Realtime transport error");
                    break;
                }
                None => {
                    info!(conn_id = %connection.id, "Realtime transport closed by server");
                    break;
                }
            }
        }
    }

    connection.set_state(ConnectionState::Disconnected);
}

/// Process one inbound text frame.
///
/// Only a failed heartbeat reply is returned as an error; malformed or
/// unknown frames are logged and dropped.
async fn handle_frame(
    connection: &Connection,
    text: &str,
    sink: &mut FrameSink,
    metrics: &RealtimeMetrics,
) -> Result<(), AppError> {
    let event = match serializer::decode_server_frame(text) {
        Ok(event) => event,
        Err(e) => {
            metrics.frame_rejected();
            warn!(conn_id = %connection.id, error = %e, "Dropping unrecognised realtime frame");
            return Ok(());
        }
    };

    if event == ServerEvent::HeartbeatPing {
        sink.send(heartbeat::pong_frame()?).await?;
        connection.heartbeat().record_reply();
        metrics.heartbeat_answered();
        trace!(conn_id = %connection.id, "Answered heartbeat ping");
    }

    let delivered = connection.dispatch(&event);
    metrics.event_dispatched();
    debug!(
        conn_id = %connection.id,
        channel = %event.channel(),
        listeners = delivered,
        "Dispatched realtime event"
    );

    Ok(())
}

async fn send_event(sink: &mut FrameSink, event: &ClientEvent) -> Result<(), AppError> {
    let text = serializer::encode_client_event(event)?;
    sink.send(text).await
}
