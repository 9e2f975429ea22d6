use clap::Args;

use super::SourceArgs;
use crate::error::ExitError;
use crate::runner;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Conversation to join
    pub conversation: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Log replies instead of sending them
    #[arg(long)]
    pub safe_mode: bool,
    /// Stop after this many passes
    #[arg(long)]
    pub max_passes: Option<u64>,
    /// Milliseconds between passes
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl RunArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let mut config = self.source.load_config()?;
        if self.safe_mode {
            config.bot.safe_mode = true;
        }
        if let Some(max) = self.max_passes {
            config.poll.max_passes = Some(max);
        }
        if let Some(interval) = self.interval_ms {
            config.poll.interval_ms = interval;
        }
        let poll = config.poll.clone();

        let mut bot = self.source.bot(config)?;
        if !bot.set_conversation(&self.conversation) {
            return Err(ExitError::Other(format!(
                "could not open conversation {}",
                self.conversation
            ))
            .into());
        }
        bot.shutdown_signal().install_ctrlc_handler()?;

        eprintln!("{} listening in {}", bot.name(), self.conversation);
        let stats = runner::run(&mut bot, &poll);
        eprintln!(
            "Stopped after {} passes ({} messages read).",
            stats.passes, stats.messages
        );
        Ok(())
    }
}
