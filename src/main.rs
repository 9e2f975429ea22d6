use std::process::ExitCode;

use clap::{Parser, Subcommand};

use convobot::commands::inspect::{ConversationsArgs, IdentityArgs, MessagesArgs};
use convobot::commands::replay::ReplayArgs;
use convobot::commands::run::RunArgs;
use convobot::commands::send::SendArgs;
use convobot::{commands, error, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "convobot",
    version,
    about = "Chat bot that polls a conversation transcript and answers commands"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Join a conversation and answer commands until stopped
    Run(RunArgs),
    /// Feed a recorded transcript to the bot and show its replies
    Replay(ReplayArgs),
    /// Work out which participant the bot is
    Identity(IdentityArgs),
    /// List conversations
    Conversations(ConversationsArgs),
    /// Print the messages of a conversation
    Messages(MessagesArgs),
    /// Send a single message
    Send(SendArgs),
    /// Print the JSON Schema for .convobot.toml
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Replay(_) => "replay",
            Self::Identity(_) => "identity",
            Self::Conversations(_) => "conversations",
            Self::Messages(_) => "messages",
            Self::Send(_) => "send",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    let _telemetry = telemetry::init();

    let cli = Cli::parse();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Run(args) => args.execute(),
        Commands::Replay(args) => args.execute(),
        Commands::Identity(args) => args.execute(),
        Commands::Conversations(args) => args.execute(),
        Commands::Messages(args) => args.execute(),
        Commands::Send(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<error::ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
