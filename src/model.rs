//! Conversation, message, and command types shared by the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a raw transcript entry, assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a raw batch (one author run in the transcript).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conversation listed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub name: String,
    pub id: String,
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}

/// A single message, possibly replying to a quoted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: EntryId,
    pub text: String,
    /// Empty when the message quotes nothing.
    pub quote_text: String,
    /// `None` only while the reconstructor is still assembling the group.
    pub author: Option<String>,
}

impl Message {
    pub fn is_from(&self, name: &str) -> bool {
        self.author.as_deref() == Some(name)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quote_text.is_empty() {
            write!(f, "{}", self.text)
        } else {
            write!(f, "> {} | {}", self.quote_text, self.text)
        }
    }
}

/// Consecutive messages from one author within one raw batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageGroup {
    pub author: String,
    pub messages: Vec<Message>,
}

impl fmt::Display for MessageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "From {}: [", self.author)?;
        for (i, m) in self.messages.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str("]")
    }
}

/// A message that looks addressed to the bot, before name matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub message: Message,
    pub command_text: String,
    /// Filled in by the dispatcher once a handler name matched.
    pub args: Vec<String>,
}

impl Command {
    pub fn new(message: Message, command_text: impl Into<String>) -> Self {
        Self {
            message,
            command_text: command_text.into(),
            args: Vec::new(),
        }
    }
}
