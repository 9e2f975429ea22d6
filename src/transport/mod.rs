//! The boundary to the live chat surface.
//!
//! A [`Transport`] lists conversations, positions itself in one, hands out the
//! raw transcript as [`RawBatch`]es and sends text back. Everything above this
//! trait is transport-agnostic.

mod memory;
mod process;

use serde::{Deserialize, Serialize};

use crate::model::{BatchId, Conversation, EntryId};

pub use memory::{MemoryTransport, TranscriptConversation, TranscriptFile};
pub use process::ProcessTransport;

/// Who authored a raw batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum BatchAuthor {
    /// The bot's own outgoing messages.
    SelfAuthored,
    Named(String),
    /// The transport found no author label.
    Unknown,
}

/// One node of a quoted-reply fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum QuoteNode {
    Text(String),
    LineBreak,
}

/// A single transcript entry as the transport sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: EntryId,
    /// `None` for placeholder nodes (stickers, joins, typing bubbles).
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quote: Option<Vec<QuoteNode>>,
}

impl RawEntry {
    pub fn text(id: &str, text: &str) -> Self {
        Self {
            id: EntryId::new(id),
            text: Some(text.to_string()),
            quote: None,
        }
    }

    /// Primary text, if the entry has any.
    pub fn primary_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// A contiguous run of entries sharing one author label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBatch {
    pub id: BatchId,
    pub author: BatchAuthor,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

/// Operations the bot needs from the chat surface.
///
/// Navigation failures are not errors: `participants` returns an empty list
/// and `select_conversation` returns `false`. `Err` is for I/O failures of the
/// transport itself.
pub trait Transport {
    fn list_conversations(&mut self) -> anyhow::Result<Vec<Conversation>>;

    fn participants(&mut self, conversation_id: &str) -> anyhow::Result<Vec<String>>;

    /// Returns true once the transport is positioned in the conversation.
    fn select_conversation(&mut self, conversation_id: &str) -> anyhow::Result<bool>;

    fn is_group_conversation(&mut self) -> anyhow::Result<bool>;

    /// Cheap count of entries without the seen flag in the current conversation.
    fn unseen_count(&mut self) -> anyhow::Result<usize>;

    /// Every retained batch of the current conversation, oldest first. With
    /// `only_unseen`, entries already marked are left out of each batch.
    fn fetch_raw_entries(&mut self, only_unseen: bool) -> anyhow::Result<Vec<RawBatch>>;

    /// Idempotent.
    fn mark_seen(&mut self, entries: &[EntryId]) -> anyhow::Result<()>;

    /// Drop all but the newest `keep_count` batches of the current conversation.
    fn evict_oldest(&mut self, keep_count: usize) -> anyhow::Result<()>;

    fn send_text(&mut self, conversation_id: &str, text: &str) -> anyhow::Result<bool>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn list_conversations(&mut self) -> anyhow::Result<Vec<Conversation>> {
        (**self).list_conversations()
    }

    fn participants(&mut self, conversation_id: &str) -> anyhow::Result<Vec<String>> {
        (**self).participants(conversation_id)
    }

    fn select_conversation(&mut self, conversation_id: &str) -> anyhow::Result<bool> {
        (**self).select_conversation(conversation_id)
    }

    fn is_group_conversation(&mut self) -> anyhow::Result<bool> {
        (**self).is_group_conversation()
    }

    fn unseen_count(&mut self) -> anyhow::Result<usize> {
        (**self).unseen_count()
    }

    fn fetch_raw_entries(&mut self, only_unseen: bool) -> anyhow::Result<Vec<RawBatch>> {
        (**self).fetch_raw_entries(only_unseen)
    }

    fn mark_seen(&mut self, entries: &[EntryId]) -> anyhow::Result<()> {
        (**self).mark_seen(entries)
    }

    fn evict_oldest(&mut self, keep_count: usize) -> anyhow::Result<()> {
        (**self).evict_oldest(keep_count)
    }

    fn send_text(&mut self, conversation_id: &str, text: &str) -> anyhow::Result<bool> {
        (**self).send_text(conversation_id, text)
    }
}
