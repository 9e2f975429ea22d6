use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{RawBatch, Transport};
use crate::model::{Conversation, EntryId};

/// A transcript snapshot, as stored in a replay file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptFile {
    #[serde(default)]
    pub conversations: Vec<TranscriptConversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConversation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub batches: Vec<RawBatch>,
}

impl TranscriptFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing transcript {}", path.display()))
    }
}

/// Transport over an in-memory transcript.
///
/// Keeps a seen flag per entry the way a live page keeps a marker attribute on
/// each rendered message, so `fetch_raw_entries(true)` and `unseen_count`
/// behave like the real thing.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    conversations: Vec<TranscriptConversation>,
    current: Option<usize>,
    seen: HashSet<EntryId>,
    sent: Vec<(String, String)>,
}

impl MemoryTransport {
    pub fn new(transcript: TranscriptFile) -> Self {
        Self {
            conversations: transcript.conversations,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(TranscriptFile::load(path)?))
    }

    /// Adds a conversation; returns `self` for chaining in tests and demos.
    pub fn with_conversation(mut self, conversation: TranscriptConversation) -> Self {
        self.conversations.push(conversation);
        self
    }

    /// Appends a batch to a conversation, as if it had just arrived.
    pub fn push_batch(&mut self, conversation_id: &str, batch: RawBatch) -> bool {
        match self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.batches.push(batch);
                true
            }
            None => false,
        }
    }

    /// Texts handed to `send_text`, as `(conversation_id, text)`.
    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }

    pub fn is_marked(&self, id: &EntryId) -> bool {
        self.seen.contains(id)
    }

    /// Batches currently retained in the selected conversation.
    pub fn retained_batches(&self) -> usize {
        self.current_conversation().map_or(0, |c| c.batches.len())
    }

    fn current_conversation(&self) -> Option<&TranscriptConversation> {
        self.current.and_then(|i| self.conversations.get(i))
    }

    fn find(&self, conversation_id: &str) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == conversation_id)
    }
}

impl Transport for MemoryTransport {
    fn list_conversations(&mut self) -> anyhow::Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .map(|c| Conversation {
                name: c.name.clone(),
                id: c.id.clone(),
            })
            .collect())
    }

    fn participants(&mut self, conversation_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .find(conversation_id)
            .map(|i| self.conversations[i].participants.clone())
            .unwrap_or_default())
    }

    fn select_conversation(&mut self, conversation_id: &str) -> anyhow::Result<bool> {
        match self.find(conversation_id) {
            Some(i) => {
                self.current = Some(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_group_conversation(&mut self) -> anyhow::Result<bool> {
        Ok(self.current_conversation().is_some_and(|c| c.group))
    }

    fn unseen_count(&mut self) -> anyhow::Result<usize> {
        Ok(self.current_conversation().map_or(0, |c| {
            c.batches
                .iter()
                .flat_map(|b| &b.entries)
                .filter(|e| e.primary_text().is_some() && !self.seen.contains(&e.id))
                .count()
        }))
    }

    fn fetch_raw_entries(&mut self, only_unseen: bool) -> anyhow::Result<Vec<RawBatch>> {
        let Some(conversation) = self.current_conversation() else {
            return Ok(Vec::new());
        };
        Ok(conversation
            .batches
            .iter()
            .map(|batch| {
                let mut batch = batch.clone();
                if only_unseen {
                    batch.entries.retain(|e| !self.seen.contains(&e.id));
                }
                batch
            })
            .collect())
    }

    fn mark_seen(&mut self, entries: &[EntryId]) -> anyhow::Result<()> {
        self.seen.extend(entries.iter().cloned());
        Ok(())
    }

    fn evict_oldest(&mut self, keep_count: usize) -> anyhow::Result<()> {
        if let Some(i) = self.current {
            let batches = &mut self.conversations[i].batches;
            if batches.len() > keep_count {
                let excess = batches.len() - keep_count;
                batches.drain(..excess);
            }
        }
        Ok(())
    }

    fn send_text(&mut self, conversation_id: &str, text: &str) -> anyhow::Result<bool> {
        if self.find(conversation_id).is_none() {
            return Ok(false);
        }
        self.sent.push((conversation_id.to_string(), text.to_string()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BatchId;
    use crate::transport::{BatchAuthor, RawEntry};

    fn transport() -> MemoryTransport {
        MemoryTransport::default().with_conversation(TranscriptConversation {
            id: "42".into(),
            name: "Dice club".into(),
            participants: vec!["Ann".into(), "Bot".into()],
            group: true,
            batches: vec![
                RawBatch {
                    id: BatchId::new("b1"),
                    author: BatchAuthor::Named("Ann".into()),
                    entries: vec![RawEntry::text("e1", "hi"), RawEntry::text("e2", "there")],
                },
                RawBatch {
                    id: BatchId::new("b2"),
                    author: BatchAuthor::SelfAuthored,
                    entries: vec![RawEntry::text("e3", "hello Ann")],
                },
            ],
        })
    }

    #[test]
    fn select_unknown_conversation_fails() {
        let mut t = transport();
        assert!(!t.select_conversation("nope").unwrap());
        assert!(t.select_conversation("42").unwrap());
        assert!(t.is_group_conversation().unwrap());
    }

    #[test]
    fn unseen_fetch_skips_marked_entries() {
        let mut t = transport();
        t.select_conversation("42").unwrap();
        assert_eq!(t.unseen_count().unwrap(), 3);

        t.mark_seen(&[EntryId::new("e1"), EntryId::new("e3")]).unwrap();
        assert_eq!(t.unseen_count().unwrap(), 1);

        let batches = t.fetch_raw_entries(true).unwrap();
        assert_eq!(batches[0].entries.len(), 1);
        assert!(batches[1].entries.is_empty());
        assert_eq!(t.fetch_raw_entries(false).unwrap()[1].entries.len(), 1);
    }

    #[test]
    fn evict_keeps_newest_batches() {
        let mut t = transport();
        t.select_conversation("42").unwrap();
        t.evict_oldest(1).unwrap();
        assert_eq!(t.retained_batches(), 1);
        let batches = t.fetch_raw_entries(false).unwrap();
        assert_eq!(batches[0].id, BatchId::new("b2"));
    }

    #[test]
    fn send_records_text() {
        let mut t = transport();
        assert!(t.send_text("42", "pong").unwrap());
        assert!(!t.send_text("7", "pong").unwrap());
        assert_eq!(t.sent(), &[("42".to_string(), "pong".to_string())]);
    }

    #[test]
    fn transcript_parses_from_json() {
        let json = r#"{
            "conversations": [{
                "id": "7",
                "name": "Ann",
                "participants": ["Ann", "Bot"],
                "batches": [{
                    "id": "b1",
                    "author": {"kind": "named", "name": "Ann"},
                    "entries": [
                        {"id": "e1", "text": "roll 6",
                         "quote": [{"kind": "text", "text": "pick"}, {"kind": "line_break"}]},
                        {"id": "e2"}
                    ]
                }, {
                    "id": "b2",
                    "author": {"kind": "self_authored"},
                    "entries": []
                }]
            }]
        }"#;
        let file: TranscriptFile = serde_json::from_str(json).unwrap();
        let conversation = &file.conversations[0];
        assert!(!conversation.group);
        assert_eq!(conversation.batches[1].author, BatchAuthor::SelfAuthored);
        assert_eq!(conversation.batches[0].entries[1].primary_text(), None);
        assert_eq!(
            conversation.batches[0].entries[0].quote.as_deref().map(<[_]>::len),
            Some(2)
        );
    }
}
