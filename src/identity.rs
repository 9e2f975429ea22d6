//! Working out which participant the bot is.
//!
//! The bot's account is the only participant present in every conversation it
//! can see, so intersecting participant lists converges on its name, often
//! after a single one-on-one conversation.

use std::collections::BTreeSet;

use crate::model::Conversation;

/// Identity used until (or unless) resolution succeeds.
pub const UNRESOLVED_IDENTITY: &str = "_Bot";

/// Intersects participant sets conversation by conversation and stops as soon
/// as exactly one name is left.
///
/// An empty participant list means the conversation could not be reached and
/// is skipped rather than intersected. Intersecting with it would empty the
/// candidates and throw away what earlier conversations narrowed down: with
/// `{A,B}`, `{}`, `{B,D}` this yields `B`, where intersecting every list would
/// start over at `{B,D}` and end unresolved. If an intersection of non-empty
/// sets collapses to nothing, the next non-empty set starts over.
pub fn resolve_identity<F>(conversations: &[Conversation], mut participants_of: F) -> String
where
    F: FnMut(&Conversation) -> Vec<String>,
{
    let mut candidates: BTreeSet<String> = BTreeSet::new();

    for conversation in conversations {
        let participants: BTreeSet<String> = participants_of(conversation).into_iter().collect();
        if participants.is_empty() {
            tracing::debug!(conversation = %conversation, "no participants, skipping");
            continue;
        }

        candidates = if candidates.is_empty() {
            participants
        } else {
            candidates.intersection(&participants).cloned().collect()
        };

        if candidates.len() == 1
            && let Some(name) = candidates.pop_first()
        {
            tracing::info!(name = %name, conversation = %conversation, "bot identity resolved");
            return name;
        }
    }

    tracing::warn!(
        remaining = candidates.len(),
        "could not narrow participants to one name, using {UNRESOLVED_IDENTITY}"
    );
    UNRESOLVED_IDENTITY.to_string()
}
