//! Built-in commands used by `convobot run` and `convobot replay`.

use anyhow::Context;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::dispatch::{CommandContext, RegistryBuilder};
use crate::model::Command;

const GREETINGS: &[&str] = &["Hi", "Hey", "Hello"];
const DEFAULT_SIDES: u32 = 6;

/// Adds the built-in commands to `registry`.
pub fn builtins(registry: RegistryBuilder) -> RegistryBuilder {
    registry
        .command(&["hi", "hey", "hello"], greet)
        .command(&["roll"], roll)
        .command(&["echo"], echo)
        .command(&["shutdown"], shutdown)
}

fn greet(ctx: &mut CommandContext<'_>, command: &Command) -> anyhow::Result<()> {
    let greeting = GREETINGS.choose(&mut rand::rng()).unwrap_or(&"Hi");
    let reply = match command.message.author.as_deref() {
        Some(author) if !author.is_empty() => format!("{greeting}, {author}!"),
        _ => format!("{greeting}!"),
    };
    ctx.reply(&reply);
    Ok(())
}

/// `roll [sides]`, six sides by default.
fn roll(ctx: &mut CommandContext<'_>, command: &Command) -> anyhow::Result<()> {
    let sides = match command.args.first() {
        None => DEFAULT_SIDES,
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                ctx.reply(&format!("Can't roll a die with {arg:?} sides. Try: roll 20"));
                return Ok(());
            }
        },
    };
    let value = rand::rng().random_range(1..=sides);
    ctx.reply(&format!("You rolled {value} (1-{sides})."));
    Ok(())
}

fn echo(ctx: &mut CommandContext<'_>, command: &Command) -> anyhow::Result<()> {
    anyhow::ensure!(!command.args.is_empty(), "echo needs something to say");
    ctx.reply(&command.args.join(" "));
    Ok(())
}

/// Stops the poll loop. Only the bot's own account may ask.
fn shutdown(ctx: &mut CommandContext<'_>, command: &Command) -> anyhow::Result<()> {
    let author = command
        .message
        .author
        .as_deref()
        .context("shutdown from a message without author")?;
    if author != ctx.bot_name() {
        tracing::warn!(author, "shutdown refused");
        ctx.reply("Only I can shut myself down.");
        return Ok(());
    }
    tracing::info!("shutdown requested by command");
    ctx.reply("Shutting down.");
    ctx.request_shutdown();
    Ok(())
}
