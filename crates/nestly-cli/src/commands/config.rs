//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use nestly_core::error::AppError;
use nestly_realtime::transport::endpoint::websocket_url;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,
    /// Validate the configuration and print the resolved endpoint
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(config_path, env)?;
            config.realtime.auth_token = config.realtime.auth_token.take().map(|_| mask());
            config.realtime.cookie = config.realtime.cookie.take().map(|_| mask());
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => {
            let config = match super::load_config(config_path, env) {
                Ok(config) => config,
                Err(e) => {
                    output::print_error(&format!("Configuration invalid: {}", e));
                    return Err(e);
                }
            };
            let url = websocket_url(&config.realtime.endpoint, &config.realtime.path)?;

            output::print_success(&format!("Configuration '{}' is valid", config_path));
            output::print_kv("Realtime URL", &url);
            output::print_kv(
                "Credentials",
                if config.realtime.with_credentials { "included" } else { "omitted" },
            );
            output::print_kv(
                "Health check",
                &format!("every {}s", config.realtime.health_check_interval_seconds),
            );
            output::print_kv(
                "Reconnect backoff",
                &if config.realtime.backoff.enabled {
                    format!("up to {}s", config.realtime.backoff.max_interval_seconds)
                } else {
                    "off".to_string()
                },
            );
            match &config.client.user_id {
                Some(user) => output::print_kv("User", user),
                None => output::print_warning("No client.user_id set; the client will stay idle"),
            }
        }
    }

    Ok(())
}

fn mask() -> String {
    "****".to_string()
}
