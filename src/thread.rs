//! Thread lifecycle controller: lazy loading a thread on first contact and
//! handling explicit resets (spec §4.8).

use crate::adapter::ChatAdapter;
use crate::error::Result;
use crate::ids::{ChannelId, ThreadId};
use crate::ingest::Ingest;
use crate::mirror::Mirror;
use crate::store::Store;

/// Lazily hydrate a thread's mirror state, then backfill any platform
/// messages newer than the last one this store has recorded. With nothing
/// stored yet (first contact, or everything was cleared by a reset),
/// backfills the thread's entire visible history from the platform.
pub async fn lazy_load_thread(
    store: &Store,
    mirror: &Mirror,
    ingest: &Ingest<'_>,
    adapter: &dyn ChatAdapter,
    channel: &ChannelId,
    thread: &ThreadId,
) -> Result<()> {
    mirror.hydrate_if_needed(store, channel, Some(thread)).await?;

    // The newest stored message_id is the backfill floor. A reset's
    // row_id anchor has no corresponding message_id once its rows are
    // deleted, so with no stored messages the only correct floor is "none"
    // — a full fetch from the platform's perspective.
    let stored = store.get_messages(channel, Some(thread), None).await?;
    let since = stored.last().map(|newest| newest.message_id.as_str().to_string());

    let backfill = adapter
        .fetch_thread_messages_since(thread, since.as_deref())
        .await?;

    for raw in backfill {
        ingest.ingest(raw, adapter.bot_id(), adapter.bot_display_name()).await?;
    }

    Ok(())
}

/// Reset a thread: anchor future loads at the current highest row, then
/// clear both the mirror and the durable store's message/boundary rows.
/// The reset record itself is never deleted — it is what lets a later
/// `lazy_load_thread` know not to re-surface history from before the reset
/// (invariant 3).
pub async fn reset_thread(
    store: &Store,
    mirror: &Mirror,
    thread: &ThreadId,
    bot: Option<&str>,
) -> Result<()> {
    let anchor = store.max_row_id_for_thread(thread).await?;
    store.record_thread_reset(thread, anchor, None, bot).await?;
    mirror.clear_thread(thread).await;
    store.clear_thread(thread).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::AttachmentInliner;
    use crate::config::EngineConfig;
    use crate::ids::{AuthorId, MessageId};
    use crate::mentions::MemberCache;
    use crate::model::{RawMessage, RawMessageKind};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeAdapter {
        bot_id: String,
        backfill: Mutex<Vec<RawMessage>>,
    }

    #[async_trait]
    impl ChatAdapter for FakeAdapter {
        fn bot_id(&self) -> &str {
            &self.bot_id
        }

        fn bot_display_name(&self) -> &str {
            "Bot"
        }

        async fn is_text_capable(&self, _channel: &ChannelId, _thread: Option<&ThreadId>) -> bool {
            true
        }

        async fn resolve_display_name(&self, user_id: &str) -> Result<String> {
            Ok(user_id.to_string())
        }

        async fn fetch_thread_messages_since(
            &self,
            _thread: &ThreadId,
            _after: Option<&str>,
        ) -> Result<Vec<RawMessage>> {
            Ok(std::mem::take(&mut *self.backfill.lock().unwrap()))
        }

        async fn post_reply(&self, _channel: &ChannelId, _thread: Option<&ThreadId>, _content: &str) -> Result<()> {
            Ok(())
        }
    }

    fn raw_message(channel: &ChannelId, thread: &ThreadId, id: &str) -> RawMessage {
        RawMessage {
            id: MessageId::from(id),
            channel_id: channel.clone(),
            thread_id: Some(thread.clone()),
            parent_channel_id: channel.clone(),
            author_id: AuthorId::from("u1"),
            author_display_name: "User".to_string(),
            content: "hi".to_string(),
            mentions: HashMap::new(),
            attachments: vec![],
            platform_timestamp: Utc::now(),
            kind: RawMessageKind::Default,
        }
    }

    #[tokio::test]
    async fn lazy_load_backfills_from_the_adapter_on_first_contact() {
        let config = EngineConfig {
            use_database_storage: false,
            ..Default::default()
        };
        let store = Store::open(&config).await.unwrap();
        let mirror = Mirror::new();
        let member_cache = MemberCache::new();
        let inliner = AttachmentInliner::new(&config);
        let ingest = Ingest {
            store: &store,
            mirror: &mirror,
            member_cache: &member_cache,
            inliner: &inliner,
            chars_per_token: config.chars_per_token,
            freeze_threshold_tokens: config.freeze_threshold_tokens,
        };

        let channel = ChannelId::from("c1");
        let thread = ThreadId::from("t1");
        let adapter = FakeAdapter {
            bot_id: "bot".to_string(),
            backfill: Mutex::new(vec![raw_message(&channel, &thread, "m1")]),
        };

        lazy_load_thread(&store, &mirror, &ingest, &adapter, &channel, &thread)
            .await
            .unwrap();

        let tail = mirror.channel_messages(&channel, Some(&thread)).await;
        assert_eq!(tail.len(), 1);
    }
}
