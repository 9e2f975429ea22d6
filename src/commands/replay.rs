//! `convobot replay`: feed a recorded transcript to the bot, batch by batch,
//! and show what it would have answered.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::{OutputFormat, print_json};
use crate::bot::Bot;
use crate::config::{self, Config};
use crate::dispatch::DispatchOutcome;
use crate::error::ExitError;
use crate::handlers;
use crate::transport::{MemoryTransport, TranscriptFile};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON transcript file
    pub transcript: PathBuf,
    /// Conversation id to replay (default: the first one in the file)
    #[arg(long)]
    pub conversation: Option<String>,
    /// Config file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Bot name (skips identity resolution)
    #[arg(long)]
    pub bot_name: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub bot: String,
    pub conversation: String,
    pub events: Vec<ReplayEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    Message {
        author: String,
        text: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        quote: String,
    },
    Reply {
        text: String,
    },
    Failed {
        command: String,
        error: String,
    },
}

impl ReplayArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let mut config = config::resolve(self.config.as_deref())?;
        if let Some(name) = &self.bot_name {
            config.bot.name = Some(name.clone());
        }
        let file = TranscriptFile::load(&self.transcript)?;
        let report = replay(file, self.conversation.as_deref(), config)?;

        match self.format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Text => {
                println!("# {} in {}", report.bot, report.conversation);
                for event in &report.events {
                    match event {
                        ReplayEvent::Message { author, text, quote } if quote.is_empty() => {
                            println!("{author}: {text}");
                        }
                        ReplayEvent::Message { author, text, quote } => {
                            println!("{author}: > {quote} | {text}");
                        }
                        ReplayEvent::Reply { text } => println!("  {}: {text}", report.bot),
                        ReplayEvent::Failed { command, error } => {
                            println!("  ! {command}: {error}");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Replays one conversation of `file`. The bot joins before the first batch,
/// then each batch arrives in turn and is handled by one pass.
pub fn replay(
    mut file: TranscriptFile,
    conversation: Option<&str>,
    mut config: Config,
) -> anyhow::Result<ReplayReport> {
    let index = match conversation {
        Some(id) => file
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ExitError::Other(format!("conversation {id} not in transcript")))?,
        None if file.conversations.is_empty() => {
            return Err(ExitError::Other("transcript has no conversations".into()).into());
        }
        None => 0,
    };
    let conversation_id = file.conversations[index].id.clone();
    let batches = std::mem::take(&mut file.conversations[index].batches);

    // Replies only ever reach the in-memory transcript.
    config.bot.safe_mode = false;

    let mut bot = Bot::builder(MemoryTransport::new(file), config)
        .commands(handlers::builtins)
        .build()?;
    if !bot.set_conversation(&conversation_id) {
        return Err(ExitError::Other(format!("could not open {conversation_id}")).into());
    }

    let mut events = Vec::new();
    for batch in batches {
        if bot.shutdown_signal().is_requested() {
            tracing::info!("shutdown requested, remaining batches skipped");
            break;
        }
        let sent_before = bot.transport().sent().len();
        bot.transport_mut().push_batch(&conversation_id, batch);
        let pass = bot.handle_commands(true);

        events.extend(pass.messages.into_iter().map(|m| ReplayEvent::Message {
            author: m.author.unwrap_or_default(),
            text: m.text,
            quote: m.quote_text,
        }));
        events.extend(pass.outcomes.into_iter().filter_map(|outcome| match outcome {
            DispatchOutcome::Failed {
                command_text,
                failure,
                ..
            } => Some(ReplayEvent::Failed {
                command: command_text,
                error: failure.to_string(),
            }),
            _ => None,
        }));
        events.extend(
            bot.transport().sent()[sent_before..]
                .iter()
                .map(|(_, text)| ReplayEvent::Reply { text: text.clone() }),
        );
    }

    Ok(ReplayReport {
        bot: bot.name().to_string(),
        conversation: conversation_id,
        events,
    })
}
