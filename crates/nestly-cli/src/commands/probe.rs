//! One-shot connection probe.

use std::time::{Duration, Instant};

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use nestly_core::error::AppError;
use nestly_core::types::UserId;
use nestly_realtime::connection::ConnectionInfo;
use nestly_realtime::RealtimeClient;

/// Arguments for the probe command
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// User to register as (defaults to client.user_id)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Seconds to wait for registration
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,
}

/// Probe outcome
#[derive(Debug, Serialize, Tabled)]
struct ProbeReport {
    #[tabled(rename = "Connection")]
    connection_id: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Listeners")]
    listeners: usize,
    #[tabled(rename = "Elapsed (ms)")]
    elapsed_ms: u128,
}

impl ProbeReport {
    fn new(url: String, info: &ConnectionInfo, elapsed: Duration) -> Self {
        Self {
            connection_id: info.id.to_string(),
            url,
            user: info.user_id.to_string(),
            state: info.state.to_string(),
            listeners: info.listeners,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

/// Execute the probe command
pub async fn execute(
    args: &ProbeArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let user = UserId::parse(super::resolve_user(args.user.as_deref(), &config)?)?;
    let url = nestly_realtime::transport::endpoint::websocket_url(
        &config.realtime.endpoint,
        &config.realtime.path,
    )?;

    let client = RealtimeClient::new(&config);
    let started = Instant::now();
    let connection = client.manager().ensure_connection(&user)?;
    let outcome = connection
        .wait_until_connected(Duration::from_secs(args.timeout))
        .await;

    let report = ProbeReport::new(url, &connection.info(), started.elapsed());
    tracing::debug!(state = %report.state, elapsed_ms = report.elapsed_ms as u64, "Probe finished");
    client.logout();

    output::print_list(&[report], format);
    outcome?;
    output::print_success("Connected and registered");
    Ok(())
}
