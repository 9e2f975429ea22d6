//! The bot: one transport, one registry, one seen tracker.
//!
//! A [`Bot`] sits in one conversation at a time. Each [`Bot::poll_once`] reads
//! the transcript, rebuilds author groups, marks what it read, trims the
//! transcript to the retention window and dispatches every candidate command.
//! Transport failures never escape: they are logged and turned into empty
//! results or `false`.

use crate::config::Config;
use crate::dispatch::{CommandContext, CommandRegistry, DispatchOutcome, RegistryBuilder};
use crate::error::RegistryError;
use crate::identity::{self, UNRESOLVED_IDENTITY};
use crate::matcher::{self, ClassifyContext};
use crate::model::{Command, Conversation, EntryId, Message, MessageGroup};
use crate::reconstruct::{flatten, reconstruct};
use crate::runner::ShutdownSignal;
use crate::seen::SeenTracker;
use crate::transport::{RawBatch, Transport};

/// Sends `text`, or only logs it in safe mode.
pub(crate) fn deliver(
    transport: &mut dyn Transport,
    conversation: &str,
    text: &str,
    safe_mode: bool,
) -> bool {
    if safe_mode {
        tracing::info!(conversation, text, "[SAFE MODE] message not sent");
        return true;
    }
    match transport.send_text(conversation, text) {
        Ok(true) => {
            tracing::debug!(conversation, text, "message sent");
            true
        }
        Ok(false) => {
            tracing::warn!(conversation, "conversation unreachable, message not sent");
            false
        }
        Err(e) => {
            tracing::warn!(conversation, error = %format!("{e:#}"), "send failed");
            false
        }
    }
}

/// Messages read by one pass and what happened to the commands among them.
#[derive(Debug, Default)]
pub struct PollReport {
    pub messages: Vec<Message>,
    pub outcomes: Vec<DispatchOutcome>,
}

/// Result of [`Bot::messages_detailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageListing {
    Grouped(Vec<MessageGroup>),
    Flat(Vec<Message>),
}

impl MessageListing {
    pub fn len(&self) -> usize {
        match self {
            Self::Grouped(groups) => groups.len(),
            Self::Flat(messages) => messages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct BotBuilder<T> {
    transport: T,
    config: Config,
    registry: RegistryBuilder,
}

impl<T: Transport> BotBuilder<T> {
    /// Registers a command handler. Handlers are tried in registration order.
    pub fn command<F>(mut self, names: &[&str], callback: F) -> Self
    where
        F: FnMut(&mut CommandContext<'_>, &Command) -> anyhow::Result<()> + 'static,
    {
        self.registry = self.registry.command(names, callback);
        self
    }

    /// Registers a set of handlers at once, e.g. [`crate::handlers::builtins`].
    pub fn commands(mut self, register: impl FnOnce(RegistryBuilder) -> RegistryBuilder) -> Self {
        self.registry = register(self.registry);
        self
    }

    /// Builds the bot, resolving its identity when the config names none.
    pub fn build(self) -> Result<Bot<T>, RegistryError> {
        let registry = self.registry.build()?;
        let configured_name = self.config.bot.name.clone();
        let mut bot = Bot {
            transport: self.transport,
            tracker: SeenTracker::new(self.config.seen.mark_seen),
            name: configured_name
                .clone()
                .unwrap_or_else(|| UNRESOLVED_IDENTITY.to_string()),
            config: self.config,
            registry,
            current: None,
            shutdown: ShutdownSignal::default(),
        };
        if configured_name.is_none() {
            bot.resolve_identity();
        }
        tracing::debug!(name = %bot.name, handlers = bot.registry.len(), "bot ready");
        Ok(bot)
    }
}

pub struct Bot<T> {
    transport: T,
    config: Config,
    registry: CommandRegistry,
    tracker: SeenTracker,
    name: String,
    current: Option<String>,
    shutdown: ShutdownSignal,
}

impl<T: Transport> Bot<T> {
    pub fn builder(transport: T, config: Config) -> BotBuilder<T> {
        BotBuilder {
            transport,
            config,
            registry: CommandRegistry::builder(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn tracker(&self) -> &SeenTracker {
        &self.tracker
    }

    pub fn current_conversation(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Works out the bot's name from participant lists and adopts it.
    pub fn resolve_identity(&mut self) -> String {
        let conversations = self.conversations();
        let transport = &mut self.transport;
        self.name = identity::resolve_identity(&conversations, |c| {
            participants_or_empty(&mut *transport, &c.id)
        });
        self.name.clone()
    }

    pub fn conversations(&mut self) -> Vec<Conversation> {
        self.transport.list_conversations().unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{e:#}"), "listing conversations failed");
            Vec::new()
        })
    }

    /// Participant names of a conversation; empty when it can't be reached.
    pub fn participants(&mut self, conversation_id: &str) -> Vec<String> {
        participants_or_empty(&mut self.transport, conversation_id)
    }

    /// Moves to `conversation_id`. Messages already there are marked seen so
    /// only what arrives afterwards is treated as new.
    pub fn set_conversation(&mut self, conversation_id: &str) -> bool {
        if self.current.as_deref() == Some(conversation_id) {
            return true;
        }
        tracing::debug!(conversation = conversation_id, "switching conversation");
        match self.transport.select_conversation(conversation_id) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(conversation = conversation_id, "could not open conversation");
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    conversation = conversation_id,
                    error = %format!("{e:#}"),
                    "opening conversation failed"
                );
                return false;
            }
        }

        self.current = Some(conversation_id.to_string());
        self.tracker = SeenTracker::new(self.config.seen.mark_seen);
        if self.tracker.is_enabled() {
            let skipped = self.read(true).iter().map(|g| g.messages.len()).sum::<usize>();
            tracing::debug!(skipped, "existing messages marked seen");
        }
        true
    }

    /// Sends `text` to `conversation`, or to the current one.
    pub fn send_message(&mut self, text: &str, conversation: Option<&str>) -> bool {
        let Some(target) = conversation.or(self.current.as_deref()) else {
            tracing::warn!("no conversation to send to");
            return false;
        };
        let target = target.to_string();
        deliver(&mut self.transport, &target, text, self.config.bot.safe_mode)
    }

    /// Reads messages, optionally from another conversation first.
    pub fn messages_detailed(
        &mut self,
        conversation: Option<&str>,
        unseen_only: bool,
        grouped: bool,
    ) -> MessageListing {
        let groups = match conversation {
            Some(id) if !self.set_conversation(id) => Vec::new(),
            _ => self.read(unseen_only),
        };
        if grouped {
            MessageListing::Grouped(groups)
        } else {
            MessageListing::Flat(flatten(&groups))
        }
    }

    /// Just the text of each message.
    pub fn messages_text(&mut self, conversation: Option<&str>, unseen_only: bool) -> Vec<String> {
        match self.messages_detailed(conversation, unseen_only, false) {
            MessageListing::Flat(messages) => messages.into_iter().map(|m| m.text).collect(),
            MessageListing::Grouped(groups) => flatten(&groups).into_iter().map(|m| m.text).collect(),
        }
    }

    /// The newest message in the current conversation, seen or not.
    ///
    /// Marks the messages of its batch but leaves retention alone: older
    /// batches may still be unread, and only a full read can tell.
    pub fn last_message(&mut self) -> Option<Message> {
        let batches = self.fetch(false);
        let last = batches.iter().rev().find(|b| {
            b.entries.iter().any(|e| e.primary_text().is_some())
        })?;
        let mut scratch = SeenTracker::new(false);
        let mut messages =
            reconstruct(std::slice::from_ref(last), &self.name, false, &mut scratch).messages();
        let newly_marked = self.tracker.mark(messages.iter().map(|m| &m.id));
        self.mirror_marks(&newly_marked);
        messages.pop()
    }

    /// Entries not yet marked seen, as counted by the transport.
    pub fn unseen_count(&mut self) -> usize {
        self.transport.unseen_count().unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{e:#}"), "unseen count failed");
            0
        })
    }

    pub fn is_group_conversation(&mut self) -> bool {
        self.transport.is_group_conversation().unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{e:#}"), "group check failed");
            false
        })
    }

    /// Classifies a single message against the current conversation.
    pub fn classify(&mut self, message: &Message) -> Option<Command> {
        let is_group = self.is_group_conversation();
        let is_solo = !is_group && message.is_from(&self.name) && self.current_is_solo();
        matcher::classify(message, &self.classify_context(is_group, is_solo))
    }

    /// One full pass: read, mark, trim, classify and dispatch.
    pub fn poll_once(&mut self, unseen_only: bool) -> Vec<Message> {
        self.handle_commands(unseen_only).messages
    }

    /// Like [`Bot::poll_once`], also returning the dispatch outcomes.
    pub fn handle_commands(&mut self, unseen_only: bool) -> PollReport {
        let Some(conversation) = self.current.clone() else {
            tracing::warn!("no conversation selected, nothing to poll");
            return PollReport::default();
        };

        let messages = flatten(&self.read(unseen_only));
        let candidates = self.candidates(&messages);
        if candidates.is_empty() {
            return PollReport {
                messages,
                outcomes: Vec::new(),
            };
        }

        tracing::debug!(
            messages = messages.len(),
            candidates = candidates.len(),
            "dispatching candidates"
        );
        let mut ctx = CommandContext::new(
            &mut self.transport,
            Some(conversation.as_str()),
            &self.name,
            self.config.bot.safe_mode,
            &self.shutdown,
        );
        let outcomes = self.registry.dispatch(candidates, &mut ctx);
        PollReport { messages, outcomes }
    }

    fn candidates(&mut self, messages: &[Message]) -> Vec<Command> {
        if messages.is_empty() {
            return Vec::new();
        }
        let is_group = self.is_group_conversation();
        let is_solo =
            !is_group && messages.iter().any(|m| m.is_from(&self.name)) && self.current_is_solo();
        let ctx = self.classify_context(is_group, is_solo);
        messages
            .iter()
            .filter_map(|m| matcher::classify(m, &ctx))
            .collect()
    }

    fn classify_context(&self, is_group: bool, is_solo: bool) -> ClassifyContext<'_> {
        ClassifyContext {
            bot_name: &self.name,
            is_group,
            is_solo,
            prefixes: &self.config.bot.command_prefixes,
            suffixes: &self.config.bot.command_suffixes,
            self_commands: self.config.bot.self_commands,
            solo_counts_as_self: self.config.bot.solo_counts_as_self,
        }
    }

    fn current_is_solo(&mut self) -> bool {
        match self.current.clone() {
            Some(id) => self.participants(&id).len() == 1,
            None => false,
        }
    }

    fn fetch(&mut self, unseen_only: bool) -> Vec<RawBatch> {
        self.transport
            .fetch_raw_entries(unseen_only)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %format!("{e:#}"), "reading transcript failed");
                Vec::new()
            })
    }

    fn read(&mut self, unseen_only: bool) -> Vec<MessageGroup> {
        let batches = self.fetch(unseen_only);
        let out = reconstruct(&batches, &self.name, unseen_only, &mut self.tracker);
        self.mirror_marks(&out.newly_marked);
        self.enforce_window(&batches);
        out.groups
    }

    fn mirror_marks(&mut self, newly_marked: &[EntryId]) {
        if !newly_marked.is_empty()
            && let Err(e) = self.transport.mark_seen(newly_marked)
        {
            tracing::warn!(error = %format!("{e:#}"), "marking entries seen failed");
        }
    }

    /// Applies the retention window to the tracker, then trims the transport
    /// by the evicted batches found at the front of what it just returned.
    fn enforce_window(&mut self, fetched: &[RawBatch]) {
        let evicted = self.tracker.enforce_window(self.config.seen.retention_window);
        if evicted.is_empty() {
            return;
        }
        let dropped = fetched
            .iter()
            .take_while(|b| evicted.contains(&b.id))
            .count();
        if dropped < evicted.len() {
            tracing::warn!(
                evicted = evicted.len(),
                dropped,
                "evicted batches are not the oldest in the transcript"
            );
        }
        if dropped == 0 {
            return;
        }
        let keep = fetched.len() - dropped;
        tracing::debug!(dropped, keep, "trimming transcript");
        if let Err(e) = self.transport.evict_oldest(keep) {
            tracing::warn!(error = %format!("{e:#}"), "trimming transcript failed");
        }
    }
}

fn participants_or_empty<T: Transport>(transport: &mut T, conversation_id: &str) -> Vec<String> {
    transport.participants(conversation_id).unwrap_or_else(|e| {
        tracing::warn!(
            conversation = conversation_id,
            error = %format!("{e:#}"),
            "listing participants failed"
        );
        Vec::new()
    })
}
