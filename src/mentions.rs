//! Mention normalization: rewriting platform mention markup (`<@id>`) into
//! human-readable `@displayname` tokens at append time, and the reverse
//! mapping when handing model output back to the chat-platform adapter.
//!
//! Grounded on the teacher's `resolve_mentions` in `messaging/discord.rs`,
//! generalized from "serenity gives us resolved `User` objects" to the
//! spec's three-tier resolution: mention metadata, then member cache, then
//! literal fallback.

use arc_swap::ArcSwap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Matches Discord-style raw mention markup: `<@id>` or `<@!id>`.
static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("mention pattern is valid"));

/// A mostly-read, optimistic last-writer-wins cache mapping user id to
/// display name, populated from server membership events. Collisions under
/// concurrent writes are benign per spec §5 — the last `ArcSwap::store`
/// wins.
#[derive(Default)]
pub struct MemberCache {
    snapshot: ArcSwap<HashMap<String, String>>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.snapshot.load().get(user_id).cloned()
    }

    /// Record or update a single member's display name.
    pub fn upsert(&self, user_id: impl Into<String>, display_name: impl Into<String>) {
        let current = self.snapshot.load();
        let mut next = (**current).clone();
        next.insert(user_id.into(), display_name.into());
        self.snapshot.store(Arc::new(next));
    }

    /// Replace the whole cache (e.g. after a full member-list sync).
    pub fn replace_all(&self, members: HashMap<String, String>) {
        self.snapshot.store(Arc::new(members));
    }
}

/// Rewrite raw inbound content's mention markup into `@displayname` tokens.
///
/// Resolution order per message, for each `<@id>`/`<@!id>` occurrence:
/// 1. `message_mentions` — mention metadata carried with the message.
/// 2. `member_cache` — server membership cache.
/// 3. Fallback to the literal `@id`.
///
/// The local bot's own id is special-cased to `bot_display_name`,
/// regardless of which tier would otherwise have resolved it.
pub fn normalize_mentions(
    content: &str,
    message_mentions: &HashMap<String, String>,
    member_cache: &MemberCache,
    bot_id: &str,
    bot_display_name: &str,
) -> String {
    MENTION_PATTERN
        .replace_all(content, |captures: &regex::Captures| {
            let id = &captures[1];
            if id == bot_id {
                return format!("@{bot_display_name}");
            }
            if let Some(name) = message_mentions.get(id) {
                return format!("@{name}");
            }
            if let Some(name) = member_cache.get(id) {
                return format!("@{name}");
            }
            format!("@{id}")
        })
        .into_owned()
}

/// Reverse mapping: convert `@name` tokens in model output back into
/// platform mention markup by looking up `name` against the supplied
/// channel roster. Unmatched handles are left literal, per spec §4.4.
pub fn denormalize_mentions(content: &str, roster: &HashMap<String, String>) -> String {
    // roster maps display name -> platform id. Longest names first so
    // "Alice Smith" doesn't get shadowed by a member named "Alice".
    let mut names: Vec<&String> = roster.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let mut result = content.to_string();
    for name in names {
        let Some(id) = roster.get(name) else { continue };
        let pattern = format!("@{name}");
        if result.contains(&pattern) {
            result = result.replace(&pattern, &format!("<@{id}>"));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_via_message_mentions_first() {
        let cache = MemberCache::new();
        cache.upsert("123", "cache-name");
        let mut mentions = HashMap::new();
        mentions.insert("123".to_string(), "snav".to_string());

        let out = normalize_mentions(
            "<@123> are you around?",
            &mentions,
            &cache,
            "987654321",
            "UnitTester",
        );
        assert_eq!(out, "@snav are you around?");
    }

    #[test]
    fn falls_back_to_member_cache() {
        let cache = MemberCache::new();
        cache.upsert("123", "snav");
        let out = normalize_mentions(
            "<@123> are you around?",
            &HashMap::new(),
            &cache,
            "987654321",
            "UnitTester",
        );
        assert_eq!(out, "@snav are you around?");
    }

    #[test]
    fn falls_back_to_literal_id() {
        let cache = MemberCache::new();
        let out = normalize_mentions("<@999> hi", &HashMap::new(), &cache, "1", "Bot");
        assert_eq!(out, "@999 hi");
    }

    #[test]
    fn self_mention_uses_bot_display_name() {
        let cache = MemberCache::new();
        let out = normalize_mentions(
            "<@987654321> can you help?",
            &HashMap::new(),
            &cache,
            "987654321",
            "UnitTester",
        );
        assert_eq!(out, "@UnitTester can you help?");
    }

    #[test]
    fn denormalize_rewrites_known_handles() {
        let mut roster = HashMap::new();
        roster.insert("snav".to_string(), "123".to_string());
        let out = denormalize_mentions("hey @snav, all good", &roster);
        assert_eq!(out, "hey <@123>, all good");
    }

    #[test]
    fn denormalize_leaves_unmatched_handles_literal() {
        let roster = HashMap::new();
        let out = denormalize_mentions("hey @ghost", &roster);
        assert_eq!(out, "hey @ghost");
    }
}
