//! Deciding whether a message is addressed to the bot.
//!
//! In one-on-one conversations everything the other side says is a candidate
//! command. In groups the bot has to be called by a prefix or suffix such as
//! `@{bot}`; matching ignores case and the punctuation people type around a
//! mention.

use crate::model::{Command, Message};

/// Characters dropped from text (and templates) before affix matching.
pub const STRIPPED_CHARS: &[char] = &['.', ',', '!', '?', '\'', '\n', '\r'];

const BOT_PLACEHOLDER: &str = "{bot}";

/// Everything classification needs to know about the conversation and rules.
#[derive(Debug, Clone)]
pub struct ClassifyContext<'a> {
    pub bot_name: &'a str,
    pub is_group: bool,
    /// The conversation has a single participant (the bot talking to itself).
    pub is_solo: bool,
    pub prefixes: &'a [String],
    pub suffixes: &'a [String],
    pub self_commands: bool,
    pub solo_counts_as_self: bool,
}

/// Substitutes the bot name for every `{bot}` token in `template`.
pub fn format_template(template: &str, bot_name: &str) -> String {
    template.replace(BOT_PLACEHOLDER, bot_name)
}

/// Lowercased text without [`STRIPPED_CHARS`].
pub fn normalize(text: &str) -> String {
    Normalized::new(text).chars.into_iter().collect()
}

/// Returns the candidate command carried by `message`, if any.
pub fn classify(message: &Message, ctx: &ClassifyContext<'_>) -> Option<Command> {
    let from_bot = message.is_from(ctx.bot_name);

    if !ctx.is_group {
        let allowed =
            !from_bot || ctx.self_commands || (ctx.is_solo && ctx.solo_counts_as_self);
        if !allowed {
            return None;
        }
        return Some(Command::new(message.clone(), message.text.trim()));
    }

    if from_bot && !ctx.self_commands {
        return None;
    }

    let normalized = Normalized::new(&message.text);

    for template in ctx.prefixes {
        let affix = Normalized::new(&format_template(template, ctx.bot_name));
        if let Some(rest) = normalized.strip_prefix(&message.text, &affix.chars) {
            return Some(Command::new(message.clone(), rest));
        }
    }

    for template in ctx.suffixes {
        let affix = Normalized::new(&format_template(template, ctx.bot_name));
        if let Some(rest) = normalized.strip_suffix(&message.text, &affix.chars) {
            return Some(Command::new(message.clone(), rest));
        }
    }

    None
}

/// Shorthand for `classify(..).is_some()`.
pub fn is_command_candidate(message: &Message, ctx: &ClassifyContext<'_>) -> bool {
    classify(message, ctx).is_some()
}

/// Normalized characters, each with the byte span of the original character
/// it came from, so a match on the normalized form can cut the original text.
struct Normalized {
    chars: Vec<char>,
    spans: Vec<(usize, usize)>,
}

impl Normalized {
    fn new(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut spans = Vec::with_capacity(text.len());
        for (start, c) in text.char_indices() {
            if STRIPPED_CHARS.contains(&c) {
                continue;
            }
            let end = start + c.len_utf8();
            for lower in c.to_lowercase() {
                chars.push(lower);
                spans.push((start, end));
            }
        }
        Self { chars, spans }
    }

    /// Original text after a normalized prefix, trimmed.
    fn strip_prefix<'t>(&self, original: &'t str, affix: &[char]) -> Option<&'t str> {
        if !self.chars.starts_with(affix) {
            return None;
        }
        let cut = match affix.len() {
            0 => 0,
            n => self.spans[n - 1].1,
        };
        Some(original[cut..].trim_start_matches(is_separator).trim())
    }

    /// Original text before a normalized suffix, trimmed.
    fn strip_suffix<'t>(&self, original: &'t str, affix: &[char]) -> Option<&'t str> {
        if !self.chars.ends_with(affix) {
            return None;
        }
        let cut = match affix.len() {
            0 => original.len(),
            n => self.spans[self.chars.len() - n].0,
        };
        Some(original[..cut].trim_end_matches(is_separator).trim())
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || STRIPPED_CHARS.contains(&c)
}
