//! Nestly realtime client daemon.
//!
//! Loads configuration, activates a realtime session for the configured
//! user, logs incoming events, and shuts down on Ctrl+C or SIGTERM.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use nestly_core::config::AppConfig;
use nestly_core::error::AppError;
use nestly_realtime::RealtimeClient;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("NESTLY_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("NESTLY_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Run the client until a shutdown signal arrives
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Nestly realtime client v{}", env!("CARGO_PKG_VERSION"));

    let client = RealtimeClient::new(&config);
    let mut chats = client.conversations().subscribe();
    let mut notifications = client.notifications().subscribe();

    let user_id = config.client.user_id.clone().unwrap_or_default();
    let session = client.activate(&user_id)?;
    if session.is_none() {
        tracing::warn!("No client.user_id configured; realtime stays idle until shutdown");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            msg = chats.recv() => match msg {
                Ok(envelope) => tracing::info!(
                    conversation_id = %envelope.conversation_id,
                    from = %envelope.from_user_id,
                    "Chat message received"
                ),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Chat feed lagged"),
                Err(RecvError::Closed) => break,
            },
            note = notifications.recv() => match note {
                Ok(envelope) => tracing::info!(kind = %envelope.kind, "Notification received"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Notification feed lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some(session) = session {
        session.deactivate().await;
    }
    client.logout();

    tracing::info!(metrics = ?client.metrics().snapshot(), "Nestly realtime client stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
