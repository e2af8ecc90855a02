//! Block freezer: after every append, checks whether the uncovered tail has
//! grown past the freeze threshold and, if so, seals it into an immutable
//! `BlockBoundary`.
//!
//! Grounded on spec §4.5's algorithm and the teacher's pattern of writing
//! through to the durable store before updating in-memory state (see
//! `tasks/store.rs`'s insert-then-cache ordering).

use crate::error::Result;
use crate::ids::ChannelId;
use crate::ids::ThreadId;
use crate::mirror::{uncovered_tail, Mirror};
use crate::model::BlockBoundary;
use crate::store::Store;
use crate::tokens::estimate_message_tokens;

/// Freezes the uncovered tail of a channel/thread into a new boundary once
/// it reaches `freeze_threshold_tokens`. A no-op if the tail is already
/// under threshold or empty.
pub struct Freezer<'a> {
    store: &'a Store,
    mirror: &'a Mirror,
    chars_per_token: f64,
    freeze_threshold_tokens: u64,
}

impl<'a> Freezer<'a> {
    pub fn new(store: &'a Store, mirror: &'a Mirror, chars_per_token: f64, freeze_threshold_tokens: u64) -> Self {
        Self {
            store,
            mirror,
            chars_per_token,
            freeze_threshold_tokens,
        }
    }

    /// Run the freeze check for a channel/thread. Call this after every
    /// successful append.
    pub async fn maybe_freeze(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> Result<()> {
        let tail = self.mirror.channel_messages(channel, thread).await;
        let boundaries = self.mirror.boundaries(channel, thread).await;
        let uncovered = uncovered_tail(&tail, &boundaries);

        if uncovered.is_empty() {
            return Ok(());
        }

        let tail_tokens: u64 = uncovered
            .iter()
            .map(|m| estimate_message_tokens(&m.content, self.chars_per_token))
            .sum();

        if tail_tokens < self.freeze_threshold_tokens {
            return Ok(());
        }

        let first = uncovered.first().expect("checked non-empty above");
        let last = uncovered.last().expect("checked non-empty above");

        let boundary = BlockBoundary {
            channel_id: channel.clone(),
            thread_id: thread.cloned(),
            first_message_id: first.message_id.clone(),
            last_message_id: last.message_id.clone(),
            first_row_id: first.row_id,
            last_row_id: last.row_id,
            token_count: tail_tokens,
            created_at: last.created_at,
        };

        self.store.insert_block_boundary(&boundary).await?;
        self.mirror.freeze(boundary).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;
    use crate::model::Message;
    use chrono::Utc;

    async fn memory_store() -> Store {
        let config = crate::config::EngineConfig {
            use_database_storage: false,
            ..Default::default()
        };
        Store::open(&config).await.unwrap()
    }

    fn message(row: i64, content: &str, channel: &ChannelId) -> Message {
        Message {
            row_id: crate::ids::RowId(row),
            channel_id: channel.clone(),
            thread_id: None,
            parent_channel_id: channel.clone(),
            message_id: MessageId::from(format!("m{row}")),
            author_id: "author".into(),
            author_display_name: "Author".to_string(),
            content: content.to_string(),
            image_refs: vec![],
            platform_timestamp: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn freezes_once_threshold_reached() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let channel = ChannelId::from("c1");

        // 5 chars_per_token=4 -> ~2 tokens each + 4 overhead = 6 tokens/msg.
        // threshold 10 -> needs 2 messages.
        for row in 1..=2 {
            let msg = message(row, "abcde", &channel);
            mirror.append(msg, crate::model::RawMessageKind::Default).await;
        }

        let freezer = Freezer::new(&store, &mirror, 4.0, 10);
        freezer.maybe_freeze(&channel, None).await.unwrap();

        let boundaries = mirror.boundaries(&channel, None).await;
        assert_eq!(boundaries.len(), 1);
        assert!(mirror.channel_messages(&channel, None).await.is_empty());

        let stored = store.get_boundaries(&channel, None, None).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn does_not_freeze_under_threshold() {
        let store = memory_store().await;
        let mirror = Mirror::new();
        let channel = ChannelId::from("c1");
        mirror
            .append(message(1, "hi", &channel), crate::model::RawMessageKind::Default)
            .await;

        let freezer = Freezer::new(&store, &mirror, 4.0, 10_000);
        freezer.maybe_freeze(&channel, None).await.unwrap();

        assert!(mirror.boundaries(&channel, None).await.is_empty());
        assert_eq!(mirror.channel_messages(&channel, None).await.len(), 1);
    }
}
