//! Context builder: assembles cached block text, a budget-trimmed tail, and
//! image references into the payload handed to the provider transport.
//!
//! Grounded on spec §4.6's trimming algorithm; the "materialize a boundary
//! into text" step follows the teacher's `conversation/context.rs` render
//! pattern of prefixing each line with the speaker's display name.

use crate::error::{ContextError, Result};
use crate::ids::{ChannelId, ThreadId};
use crate::mirror::Mirror;
use crate::model::{BuiltContext, Role, TailTurn};
use crate::store::Store;
use crate::tokens::estimate_message_tokens;

pub struct ContextBuilder<'a> {
    store: &'a Store,
    mirror: &'a Mirror,
    max_context_tokens: u64,
    chars_per_token: f64,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(store: &'a Store, mirror: &'a Mirror, max_context_tokens: u64, chars_per_token: f64) -> Self {
        Self {
            store,
            mirror,
            max_context_tokens,
            chars_per_token,
        }
    }

    /// Build the full context for a channel/thread.
    ///
    /// `is_text_capable` reflects the adapter's judgment of whether this
    /// channel/thread can receive a text reply at all (e.g. a voice
    /// channel's text sidebar being disabled) — checked before any other
    /// work per spec §4.6.
    pub async fn build(
        &self,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
        bot_id: &str,
        bot_display_name: &str,
        is_text_capable: bool,
    ) -> Result<BuiltContext> {
        if !is_text_capable {
            return Err(ContextError::NotTextCapable {
                channel: channel.clone(),
            }
            .into());
        }

        self.mirror.hydrate_if_needed(self.store, channel, thread).await?;

        let boundaries = self.mirror.boundaries(channel, thread).await;
        let tail = self.mirror.channel_messages(channel, thread).await;

        // Boundaries only cache a token count, not rendered text (spec §4.2:
        // the durable store holds raw messages, not the rendered block). To
        // render a cached block's text we replay its covered messages.
        let mut cached_blocks = Vec::with_capacity(boundaries.len());
        for boundary in &boundaries {
            let covered = self
                .store
                .get_messages_in_range(channel, thread, boundary.first_row_id, boundary.last_row_id)
                .await?;
            cached_blocks.push(render_lines(&covered, bot_id, bot_display_name));
        }

        let boundary_tokens: u64 = boundaries.iter().map(|b| b.token_count).sum();
        let budget = self.max_context_tokens.saturating_sub(boundary_tokens);

        let trimmed = trim_tail_to_budget(&tail, budget, self.chars_per_token)?;

        let tail_turns: Vec<TailTurn> = trimmed
            .iter()
            .map(|m| TailTurn {
                role: if m.author_id.as_str() == bot_id {
                    Role::Assistant
                } else {
                    Role::User
                },
                content: format!("{}: {}", m.author_display_name, m.content),
            })
            .collect();

        let image_blocks = trimmed
            .iter()
            .flat_map(|m| m.image_refs.clone())
            .collect();

        Ok(BuiltContext {
            cached_blocks,
            tail: tail_turns,
            image_blocks,
        })
    }
}

fn render_lines(messages: &[crate::model::Message], bot_id: &str, bot_display_name: &str) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = if m.author_id.as_str() == bot_id {
                bot_display_name
            } else {
                m.author_display_name.as_str()
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop oldest tail messages until the remaining ones fit `budget` tokens,
/// always keeping at least the newest message. If even the newest message
/// alone exceeds budget, returns `ContextError::BudgetInfeasible` rather
/// than silently truncating content (spec §4.6, §7).
fn trim_tail_to_budget(
    tail: &[crate::model::Message],
    budget: u64,
    chars_per_token: f64,
) -> Result<Vec<crate::model::Message>> {
    if tail.is_empty() {
        return Ok(Vec::new());
    }

    let newest_tokens = estimate_message_tokens(&tail[tail.len() - 1].content, chars_per_token);
    if newest_tokens > budget {
        return Err(ContextError::BudgetInfeasible {
            tokens: newest_tokens,
            budget,
        }
        .into());
    }

    let mut start = 0;
    loop {
        let window = &tail[start..];
        let tokens: u64 = window
            .iter()
            .map(|m| estimate_message_tokens(&m.content, chars_per_token))
            .sum();
        if tokens <= budget || window.len() == 1 {
            return Ok(window.to_vec());
        }
        start += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ChannelId, MessageId, RowId};
    use crate::model::{Message, RawMessageKind};
    use chrono::Utc;

    async fn memory_store() -> Store {
        let config = crate::config::EngineConfig {
            use_database_storage: false,
            ..Default::default()
        };
        Store::open(&config).await.unwrap()
    }

    fn message(row: i64, author: &str, content: &str, channel: &ChannelId) -> Message {
        Message {
            row_id: RowId(row),
            channel_id: channel.clone(),
            thread_id: None,
            parent_channel_id: channel.clone(),
            message_id: MessageId::from(format!("m{row}")),
            author_id: author.into(),
            author_display_name: author.to_string(),
            content: content.to_string(),
            image_refs: vec![],
            platform_timestamp: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_non_text_capable_channels() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let builder = ContextBuilder::new(&store, &mirror, 180_000, 4.0);
        let channel = ChannelId::from("c1");
        let err = builder.build(&channel, None, "bot", "Bot", false).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Context(ContextError::NotTextCapable { .. })));
    }

    #[tokio::test]
    async fn trims_oldest_messages_to_fit_budget() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let channel = ChannelId::from("c1");

        for row in 1..=5 {
            mirror
                .append(message(row, "user", "abcdefgh", &channel), RawMessageKind::Default)
                .await;
        }

        // Each message: 8 chars / 4.0 = 2 + overhead 4 = 6 tokens. Budget 13
        // fits only the newest 2 messages (12 tokens).
        let builder = ContextBuilder::new(&store, &mirror, 13, 4.0);
        let context = builder.build(&channel, None, "bot", "Bot", true).await.unwrap();
        assert_eq!(context.tail.len(), 2);
    }

    #[tokio::test]
    async fn cached_blocks_substitute_bot_display_name_for_the_bots_own_lines() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let channel = ChannelId::from("c1");

        let bot_msg = message(1, "bot", "hello there", &channel);
        let user_msg = message(2, "user", "hi bot", &channel);

        let row1 = store.insert_message(&bot_msg).await.unwrap();
        let row2 = store.insert_message(&user_msg).await.unwrap();

        let boundary = crate::model::BlockBoundary {
            channel_id: channel.clone(),
            thread_id: None,
            first_message_id: bot_msg.message_id.clone(),
            last_message_id: user_msg.message_id.clone(),
            first_row_id: row1,
            last_row_id: row2,
            token_count: 20,
            created_at: Utc::now(),
        };
        store.insert_block_boundary(&boundary).await.unwrap();
        mirror.freeze(boundary).await;

        let builder = ContextBuilder::new(&store, &mirror, 180_000, 4.0);
        let context = builder
            .build(&channel, None, "bot", "Assistant Bot", true)
            .await
            .unwrap();

        assert_eq!(context.cached_blocks.len(), 1);
        assert!(context.cached_blocks[0].contains("Assistant Bot: hello there"));
        assert!(!context.cached_blocks[0].contains("bot: hello there"));
    }

    #[tokio::test]
    async fn budget_infeasible_when_newest_message_alone_exceeds_budget() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let channel = ChannelId::from("c1");
        mirror
            .append(message(1, "user", "a very long message indeed", &channel), RawMessageKind::Default)
            .await;

        let builder = ContextBuilder::new(&store, &mirror, 1, 4.0);
        let err = builder.build(&channel, None, "bot", "Bot", true).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Context(ContextError::BudgetInfeasible { .. })));
    }
}
