//! Rebuilding messages and author groups from raw transcript batches.

use crate::model::{EntryId, Message, MessageGroup};
use crate::seen::SeenTracker;
use crate::transport::{BatchAuthor, QuoteNode, RawBatch, RawEntry};

/// Output of one reconstruction pass.
#[derive(Debug, Default)]
pub struct Reconstruction {
    pub groups: Vec<MessageGroup>,
    /// Entries marked by this pass, to be mirrored to the transport.
    pub newly_marked: Vec<EntryId>,
}

impl Reconstruction {
    /// Messages in transcript order, each carrying its group's author.
    pub fn messages(&self) -> Vec<Message> {
        flatten(&self.groups)
    }
}

/// Turns raw batches into message groups, one group per batch.
///
/// Entries without text are skipped. With `unseen_only`, entries the tracker
/// already saw are skipped too. Every message read is marked in `tracker`
/// before returning, including those of batches dropped for lacking an author,
/// so they are not read again on the next pass.
pub fn reconstruct(
    batches: &[RawBatch],
    bot_name: &str,
    unseen_only: bool,
    tracker: &mut SeenTracker,
) -> Reconstruction {
    let mut out = Reconstruction::default();

    for batch in batches {
        tracker.observe(batch);

        let author = match &batch.author {
            BatchAuthor::SelfAuthored => bot_name.to_string(),
            BatchAuthor::Named(label) => label.clone(),
            BatchAuthor::Unknown => String::new(),
        };

        let texts: Vec<&RawEntry> = batch
            .entries
            .iter()
            .filter(|entry| {
                let has_text = entry.primary_text().is_some();
                if !has_text {
                    tracing::trace!(entry = %entry.id, "entry has no text, skipping");
                }
                has_text
            })
            .collect();
        let fresh = tracker.filter_and_mark(texts.iter().copied());
        if tracker.is_enabled() {
            out.newly_marked.extend(fresh.iter().map(|entry| entry.id.clone()));
        }

        let read = if unseen_only { fresh } else { texts };
        let mut messages: Vec<Message> = read
            .into_iter()
            .map(|entry| Message {
                id: entry.id.clone(),
                text: entry.primary_text().unwrap_or_default().to_string(),
                quote_text: quote_text(entry),
                author: None,
            })
            .collect();

        if messages.is_empty() || author.is_empty() {
            if !messages.is_empty() {
                tracing::debug!(batch = %batch.id, "batch has no author label, dropping its messages");
            }
            continue;
        }

        for message in &mut messages {
            message.author = Some(author.clone());
        }
        out.groups.push(MessageGroup { author, messages });
    }

    out
}

/// Flattens groups into messages, keeping transcript order.
pub fn flatten(groups: &[MessageGroup]) -> Vec<Message> {
    groups
        .iter()
        .flat_map(|g| g.messages.iter().cloned())
        .collect()
}

/// Concatenated text of an entry's quote fragment, line breaks as `\n`.
pub fn quote_text(entry: &RawEntry) -> String {
    let Some(nodes) = &entry.quote else {
        return String::new();
    };
    let mut out = String::new();
    for node in nodes {
        match node {
            QuoteNode::Text(text) => out.push_str(text),
            QuoteNode::LineBreak => out.push('\n'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BatchId;

    fn named(id: &str, author: &str, texts: &[&str]) -> RawBatch {
        RawBatch {
            id: BatchId::new(id),
            author: BatchAuthor::Named(author.into()),
            entries: texts
                .iter()
                .enumerate()
                .map(|(i, t)| RawEntry::text(&format!("{id}-{i}"), t))
                .collect(),
        }
    }

    fn shape(groups: &[MessageGroup]) -> Vec<(String, usize)> {
        groups
            .iter()
            .map(|g| (g.author.clone(), g.messages.len()))
            .collect()
    }

    #[test]
    fn separated_runs_stay_separate() {
        let batches = vec![
            named("b1", "X", &["one", "two"]),
            named("b2", "Y", &["three"]),
            named("b3", "X", &["four"]),
        ];
        let mut tracker = SeenTracker::new(true);
        let out = reconstruct(&batches, "Bot", true, &mut tracker);
        assert_eq!(
            shape(&out.groups),
            vec![("X".to_string(), 2), ("Y".to_string(), 1), ("X".to_string(), 1)]
        );
        assert!(out
            .groups
            .iter()
            .all(|g| g.messages.iter().all(|m| m.is_from(&g.author))));
    }

    #[test]
    fn self_batches_are_authored_by_bot() {
        let batches = vec![RawBatch {
            id: BatchId::new("b1"),
            author: BatchAuthor::SelfAuthored,
            entries: vec![RawEntry::text("e1", "pong")],
        }];
        let mut tracker = SeenTracker::new(true);
        let out = reconstruct(&batches, "Dicebot", true, &mut tracker);
        assert_eq!(out.groups[0].author, "Dicebot");
        assert_eq!(out.messages()[0].author.as_deref(), Some("Dicebot"));
    }

    #[test]
    fn placeholder_entries_and_empty_batches_are_skipped() {
        let mut batch = named("b1", "Ann", &["hi"]);
        batch.entries.insert(
            0,
            RawEntry {
                id: EntryId::new("sticker"),
                text: None,
                quote: None,
            },
        );
        let batches = vec![batch, named("b2", "Bob", &[])];
        let mut tracker = SeenTracker::new(true);
        let out = reconstruct(&batches, "Bot", true, &mut tracker);
        assert_eq!(shape(&out.groups), vec![("Ann".to_string(), 1)]);
        assert!(!tracker.is_seen(&EntryId::new("sticker")));
    }

    #[test]
    fn unknown_author_is_dropped_but_marked() {
        let batches = vec![RawBatch {
            id: BatchId::new("b1"),
            author: BatchAuthor::Unknown,
            entries: vec![RawEntry::text("e1", "who said this")],
        }];
        let mut tracker = SeenTracker::new(true);
        let out = reconstruct(&batches, "Bot", true, &mut tracker);
        assert!(out.groups.is_empty());
        assert_eq!(out.newly_marked, vec![EntryId::new("e1")]);
    }

    #[test]
    fn second_pass_only_returns_new_entries() {
        let mut batches = vec![named("b1", "Ann", &["a", "b"])];
        let mut tracker = SeenTracker::new(true);
        reconstruct(&batches, "Bot", true, &mut tracker);

        batches[0].entries.push(RawEntry::text("late", "c"));
        let out = reconstruct(&batches, "Bot", true, &mut tracker);
        let texts: Vec<String> = out.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["c"]);
        assert_eq!(out.newly_marked, vec![EntryId::new("late")]);
    }

    #[test]
    fn reading_everything_ignores_seen_state() {
        let batches = vec![named("b1", "Ann", &["a"])];
        let mut tracker = SeenTracker::new(true);
        reconstruct(&batches, "Bot", true, &mut tracker);
        let out = reconstruct(&batches, "Bot", false, &mut tracker);
        assert_eq!(out.messages().len(), 1);
        assert!(out.newly_marked.is_empty());
    }

    #[test]
    fn marks_follow_the_tracker() {
        let batches = vec![named("b1", "Ann", &["a", "b"])];
        let mut tracker = SeenTracker::new(true);
        tracker.mark([&EntryId::new("b1-0")]);
        let out = reconstruct(&batches, "Bot", true, &mut tracker);
        assert_eq!(out.messages().len(), 1);
        assert_eq!(out.newly_marked, vec![EntryId::new("b1-1")]);

        let mut off = SeenTracker::new(false);
        for _ in 0..2 {
            let out = reconstruct(&batches, "Bot", true, &mut off);
            assert_eq!(out.messages().len(), 2);
            assert!(out.newly_marked.is_empty());
        }
    }

    #[test]
    fn quote_fragments_join_with_newlines() {
        let entry = RawEntry {
            id: EntryId::new("e1"),
            text: Some("agreed".into()),
            quote: Some(vec![
                QuoteNode::Text("first line".into()),
                QuoteNode::LineBreak,
                QuoteNode::Text("second".into()),
            ]),
        };
        assert_eq!(quote_text(&entry), "first line\nsecond");
        assert_eq!(quote_text(&RawEntry::text("e2", "plain")), "");
    }
}
