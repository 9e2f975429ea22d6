//! Read-only commands: `identity`, `conversations`, `messages`.

use clap::Args;
use serde::Serialize;

use super::{OutputFormat, SourceArgs, print_json};
use crate::bot::MessageListing;
use crate::error::ExitError;

#[derive(Debug, Args)]
pub struct IdentityArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct IdentityReport {
    name: String,
    resolved: bool,
}

impl IdentityArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let mut config = self.source.load_config()?;
        // Always resolve, even if the config names the bot.
        config.bot.name = None;
        let bot = self.source.bot(config)?;
        let report = IdentityReport {
            name: bot.name().to_string(),
            resolved: bot.name() != crate::identity::UNRESOLVED_IDENTITY,
        };
        match self.format {
            OutputFormat::Json => print_json(&report),
            OutputFormat::Text => {
                println!("{}", report.name);
                if !report.resolved {
                    eprintln!("warning: identity could not be narrowed to one participant");
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct ConversationsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Also list participants
    #[arg(long)]
    pub participants: bool,
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct ConversationRow {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    participants: Option<Vec<String>>,
}

impl ConversationsArgs {
    /// Talks to the transport directly so driver failures keep their exit code.
    pub fn execute(&self) -> anyhow::Result<()> {
        let config = self.source.load_config()?;
        let mut transport = self.source.transport(&config)?;
        let mut rows = Vec::new();
        for conversation in transport.list_conversations()? {
            let participants = if self.participants {
                Some(transport.participants(&conversation.id)?)
            } else {
                None
            };
            rows.push(ConversationRow {
                id: conversation.id,
                name: conversation.name,
                participants,
            });
        }

        match self.format {
            OutputFormat::Json => print_json(&rows),
            OutputFormat::Text => {
                for row in &rows {
                    match &row.participants {
                        Some(names) => println!("{} [{}]: {}", row.name, row.id, names.join(", ")),
                        None => println!("{} [{}]", row.name, row.id),
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct MessagesArgs {
    /// Conversation to read
    pub conversation: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Group consecutive messages by author
    #[arg(long)]
    pub grouped: bool,
    /// Print only the newest message
    #[arg(long, conflicts_with = "grouped")]
    pub last: bool,
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl MessagesArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let mut config = self.source.load_config()?;
        // Joining a conversation would otherwise hide its history.
        config.seen.mark_seen = false;
        let mut bot = self.source.bot(config)?;
        if !bot.set_conversation(&self.conversation) {
            return Err(ExitError::Other(format!(
                "could not open conversation {}",
                self.conversation
            ))
            .into());
        }

        if self.last {
            let last = bot.last_message();
            return match self.format {
                OutputFormat::Json => print_json(&last),
                OutputFormat::Text => {
                    if let Some(message) = last {
                        println!("{}: {message}", message.author.as_deref().unwrap_or_default());
                    }
                    Ok(())
                }
            };
        }

        let listing = bot.messages_detailed(None, false, self.grouped);
        match (self.format, listing) {
            (OutputFormat::Json, MessageListing::Grouped(groups)) => print_json(&groups),
            (OutputFormat::Json, MessageListing::Flat(messages)) => print_json(&messages),
            (OutputFormat::Text, MessageListing::Grouped(groups)) => {
                for group in &groups {
                    println!("{group}");
                }
                Ok(())
            }
            (OutputFormat::Text, MessageListing::Flat(messages)) => {
                for message in &messages {
                    println!("{}: {message}", message.author.as_deref().unwrap_or_default());
                }
                Ok(())
            }
        }
    }
}
