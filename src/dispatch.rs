//! Command registry and dispatch.
//!
//! Handlers are registered once, in order, through [`RegistryBuilder`]. For
//! each candidate command the first handler with a matching name runs, and
//! only that one. A handler that fails or panics is reported as
//! [`DispatchOutcome::Failed`] and the remaining candidates still run.

use std::panic::{self, AssertUnwindSafe};

use crate::bot::deliver;
use crate::error::{HandlerFailure, RegistryError};
use crate::model::Command;
use crate::runner::ShutdownSignal;
use crate::transport::Transport;

/// Callback run for a matched command.
pub type Callback = Box<dyn FnMut(&mut CommandContext<'_>, &Command) -> anyhow::Result<()>>;

/// What a handler can do while it runs.
pub struct CommandContext<'a> {
    transport: &'a mut dyn Transport,
    conversation_id: Option<&'a str>,
    bot_name: &'a str,
    safe_mode: bool,
    shutdown: &'a ShutdownSignal,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        conversation_id: Option<&'a str>,
        bot_name: &'a str,
        safe_mode: bool,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            transport,
            conversation_id,
            bot_name,
            safe_mode,
            shutdown,
        }
    }

    pub fn bot_name(&self) -> &str {
        self.bot_name
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id
    }

    /// Sends `text` to the conversation the command came from.
    pub fn reply(&mut self, text: &str) -> bool {
        match self.conversation_id {
            Some(conversation) => deliver(&mut *self.transport, conversation, text, self.safe_mode),
            None => {
                tracing::warn!("no conversation selected, dropping reply");
                false
            }
        }
    }

    /// Asks the poll loop to stop once the current pass is over.
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }
}

/// A named command and its callback.
pub struct CommandHandler {
    names: Vec<String>,
    callback: Callback,
}

impl CommandHandler {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// First name (in registration order) that `text` invokes.
    fn matching_name(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.names
            .iter()
            .find(|name| {
                let name = name.to_lowercase();
                lowered == name
                    || lowered
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with(' '))
            })
            .map(String::as_str)
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Collects handlers in registration order.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<CommandHandler>,
}

impl RegistryBuilder {
    /// Registers `callback` under `names`, tried in the order given.
    pub fn command<F>(mut self, names: &[&str], callback: F) -> Self
    where
        F: FnMut(&mut CommandContext<'_>, &Command) -> anyhow::Result<()> + 'static,
    {
        self.handlers.push(CommandHandler {
            names: names.iter().map(ToString::to_string).collect(),
            callback: Box::new(callback),
        });
        self
    }

    /// Validates names: at least one per handler, none empty or containing whitespace.
    pub fn build(self) -> Result<CommandRegistry, RegistryError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            if handler.names.is_empty() {
                return Err(RegistryError::NoNames { index });
            }
            if let Some(name) = handler
                .names
                .iter()
                .find(|n| n.is_empty() || n.chars().any(char::is_whitespace))
            {
                return Err(RegistryError::InvalidName { name: name.clone() });
            }
        }
        Ok(CommandRegistry {
            handlers: self.handlers,
        })
    }
}

/// Result of dispatching one candidate.
#[derive(Debug)]
pub enum DispatchOutcome {
    Dispatched { command_text: String, name: String },
    Unmatched { command_text: String },
    Failed {
        command_text: String,
        name: String,
        failure: HandlerFailure,
    },
}

impl DispatchOutcome {
    /// Whether a handler ran (successfully or not).
    pub fn handled(&self) -> bool {
        !matches!(self, DispatchOutcome::Unmatched { .. })
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    handlers: Vec<CommandHandler>,
}

impl CommandRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handlers(&self) -> &[CommandHandler] {
        &self.handlers
    }

    /// Index of the first handler matching `command_text`, with the matched name.
    pub fn resolve(&self, command_text: &str) -> Option<(usize, &str)> {
        self.handlers
            .iter()
            .enumerate()
            .find_map(|(i, h)| h.matching_name(command_text).map(|name| (i, name)))
    }

    /// Runs at most one handler per candidate, in candidate order.
    pub fn dispatch(
        &mut self,
        candidates: Vec<Command>,
        ctx: &mut CommandContext<'_>,
    ) -> Vec<DispatchOutcome> {
        candidates
            .into_iter()
            .map(|command| self.dispatch_one(command, ctx))
            .collect()
    }

    fn dispatch_one(&mut self, mut command: Command, ctx: &mut CommandContext<'_>) -> DispatchOutcome {
        let Some((index, name)) = self
            .resolve(&command.command_text)
            .map(|(i, name)| (i, name.to_string()))
        else {
            tracing::debug!(command = %command.command_text, "no handler matched");
            return DispatchOutcome::Unmatched {
                command_text: command.command_text,
            };
        };

        command.args = command
            .command_text
            .chars()
            .skip(name.chars().count())
            .collect::<String>()
            .split_whitespace()
            .map(ToString::to_string)
            .collect();

        tracing::info!(
            command = %command.command_text,
            handler = %name,
            author = command.message.author.as_deref().unwrap_or_default(),
            "dispatching command"
        );

        let handler = &mut self.handlers[index];
        let result = panic::catch_unwind(AssertUnwindSafe(|| (handler.callback)(ctx, &command)));

        let failure = match result {
            Ok(Ok(())) => {
                return DispatchOutcome::Dispatched {
                    command_text: command.command_text,
                    name,
                };
            }
            Ok(Err(e)) => HandlerFailure::Error(e),
            Err(payload) => HandlerFailure::Panicked(panic_message(payload.as_ref())),
        };

        tracing::error!(
            command = %command.command_text,
            handler = %name,
            error = %failure,
            "command handler failed"
        );
        DispatchOutcome::Failed {
            command_text: command.command_text,
            name,
            failure,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
