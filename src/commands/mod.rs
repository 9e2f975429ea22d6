pub mod inspect;
pub mod replay;
pub mod run;
pub mod schema;
pub mod send;

use std::path::PathBuf;

use clap::Args;

use crate::bot::Bot;
use crate::config::{self, Config};
use crate::handlers;
use crate::transport::{MemoryTransport, ProcessTransport, Transport};

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where conversations come from and who the bot is.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Config file (default: .convobot.toml here, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Read conversations from a JSON transcript instead of the driver program
    #[arg(long)]
    pub transcript: Option<PathBuf>,
    /// Bot name (skips identity resolution)
    #[arg(long)]
    pub bot_name: Option<String>,
}

impl SourceArgs {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = config::resolve(self.config.as_deref())?;
        if let Some(name) = &self.bot_name {
            config.bot.name = Some(name.clone());
        }
        Ok(config)
    }

    pub fn transport(&self, config: &Config) -> anyhow::Result<Box<dyn Transport>> {
        let transport: Box<dyn Transport> = match &self.transcript {
            Some(path) => Box::new(MemoryTransport::from_file(path)?),
            None => Box::new(ProcessTransport::new(&config.transport)),
        };
        Ok(transport)
    }

    /// A bot with the built-in commands over the selected transport.
    pub fn bot(&self, config: Config) -> anyhow::Result<Bot<Box<dyn Transport>>> {
        let transport = self.transport(&config)?;
        Ok(Bot::builder(transport, config)
            .commands(handlers::builtins)
            .build()?)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
