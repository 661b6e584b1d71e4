//! CLI command definitions and dispatch.

pub mod config;
pub mod listen;
pub mod probe;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use nestly_core::config::AppConfig;
use nestly_core::error::AppError;

/// Nestly realtime client diagnostics
#[derive(Debug, Parser)]
#[command(name = "nestly", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (`config/{env}.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Configuration management
    Config(config::ConfigArgs),
    /// Connect once, register, and report the handshake outcome
    Probe(probe::ProbeArgs),
    /// Run a realtime session and print incoming events
    Listen(listen::ListenArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Config(args) => config::execute(args, &self.config, &self.env, self.format),
            Commands::Probe(args) => {
                probe::execute(args, &self.config, &self.env, self.format).await
            }
            Commands::Listen(args) => {
                listen::execute(args, &self.config, &self.env, self.format).await
            }
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str, env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path, env)
}

/// Helper: pick the user from the command line, falling back to configuration
pub fn resolve_user(arg: Option<&str>, config: &AppConfig) -> Result<String, AppError> {
    arg.map(str::to_owned)
        .or_else(|| config.client.user_id.clone())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            AppError::validation("No user given: pass --user or set client.user_id in config")
        })
}
