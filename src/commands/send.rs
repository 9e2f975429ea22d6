use clap::Args;

use super::SourceArgs;
use crate::error::ExitError;

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Conversation to send to
    pub conversation: String,
    /// Message text
    pub text: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Log the message instead of sending it
    #[arg(long)]
    pub safe_mode: bool,
}

impl SendArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let mut config = self.source.load_config()?;
        config.bot.safe_mode |= self.safe_mode;
        // Sending needs no identity.
        if config.bot.name.is_none() {
            config.bot.name = Some(crate::identity::UNRESOLVED_IDENTITY.to_string());
        }
        let mut bot = self.source.bot(config)?;
        if !bot.send_message(&self.text, Some(&self.conversation)) {
            return Err(ExitError::Other(format!(
                "message not delivered to {}",
                self.conversation
            ))
            .into());
        }
        Ok(())
    }
}
