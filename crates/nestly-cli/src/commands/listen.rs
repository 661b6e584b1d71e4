//! Stream realtime events to the terminal.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use crate::output::{self, OutputFormat};
use nestly_core::error::AppError;
use nestly_realtime::RealtimeClient;

/// Arguments for the listen command
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// User to register as (defaults to client.user_id)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Stop after this many events
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

/// One received event
#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    #[tabled(rename = "Received")]
    received_at: DateTime<Utc>,
    #[tabled(rename = "Channel")]
    channel: &'static str,
    #[tabled(rename = "Summary")]
    summary: String,
}

/// Per-conversation summary printed on exit
#[derive(Debug, Serialize, Tabled)]
struct ConversationRow {
    #[tabled(rename = "Conversation")]
    conversation: String,
    #[tabled(rename = "Messages")]
    messages: usize,
    #[tabled(rename = "Unread")]
    unread: usize,
}

/// Execute the listen command
pub async fn execute(
    args: &ListenArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let user = super::resolve_user(args.user.as_deref(), &config)?;

    let client = RealtimeClient::new(&config);
    let mut chats = client.conversations().subscribe();
    let mut notifications = client.notifications().subscribe();

    let Some(session) = client.activate(&user)? else {
        return Err(AppError::validation("User ID must not be empty"));
    };
    output::print_success(&format!("Listening as '{}' (Ctrl+C to stop)", user));

    let mut seen = 0usize;
    while args.count.is_none_or(|limit| seen < limit) {
        let row = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            msg = chats.recv() => match msg {
                Ok(envelope) => EventRow {
                    received_at: Utc::now(),
                    channel: "chat/message",
                    summary: format!(
                        "{} -> {} [{}] {}",
                        envelope.from_user_id,
                        envelope.to_user_id,
                        envelope.conversation_id,
                        envelope.message
                    ),
                },
                Err(RecvError::Lagged(skipped)) => {
                    output::print_warning(&format!("Skipped {} chat messages", skipped));
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            note = notifications.recv() => match note {
                Ok(envelope) => EventRow {
                    received_at: Utc::now(),
                    channel: "notify/event",
                    summary: format!("{} {}", envelope.kind, envelope.data),
                },
                Err(RecvError::Lagged(skipped)) => {
                    output::print_warning(&format!("Skipped {} notifications", skipped));
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };
        output::print_row(&row, format);
        seen += 1;
    }

    session.deactivate().await;

    let conversations: Vec<ConversationRow> = client
        .conversations()
        .conversations()
        .into_iter()
        .map(|c| ConversationRow {
            conversation: c.conversation_id.to_string(),
            messages: c.messages.len(),
            unread: c.unread,
        })
        .collect();
    output::print_list(&conversations, format);
    output::print_item(&client.metrics().snapshot(), format);

    client.logout();
    Ok(())
}
