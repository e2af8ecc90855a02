//! Shared message ingestion pipeline: normalize mentions, inline
//! attachments, persist, mirror, and check the freezer — the sequence both
//! live append and thread backfill run per message (spec §4.2, §4.4).

use crate::attachments::AttachmentInliner;
use crate::error::Result;
use crate::freezer::Freezer;
use crate::mentions::{normalize_mentions, MemberCache};
use crate::mirror::Mirror;
use crate::model::{Message, RawMessage, RawMessageKind};
use crate::store::Store;

pub struct Ingest<'a> {
    pub store: &'a Store,
    pub mirror: &'a Mirror,
    pub member_cache: &'a MemberCache,
    pub inliner: &'a AttachmentInliner,
    pub chars_per_token: f64,
    pub freeze_threshold_tokens: u64,
}

impl<'a> Ingest<'a> {
    /// Run a single raw message through the full pipeline, returning the
    /// `Message` it produced. Thread-starter notices (platform-synthesized
    /// "this thread was created" markers) are never persisted to the
    /// durable store or mirrored — storing them would let them resurface
    /// in the tail on the next hydration, which `append`'s drop is meant
    /// to prevent permanently (spec §4.2, S7).
    pub async fn ingest(&self, raw: RawMessage, bot_id: &str, bot_display_name: &str) -> Result<Message> {
        let normalized = normalize_mentions(&raw.content, &raw.mentions, self.member_cache, bot_id, bot_display_name);
        let (content, image_refs) = self.inliner.inline(&normalized, &raw.attachments).await;

        let message = Message {
            row_id: crate::ids::RowId::ZERO,
            channel_id: raw.channel_id.clone(),
            thread_id: raw.thread_id.clone(),
            parent_channel_id: raw.parent_channel_id.clone(),
            message_id: raw.id.clone(),
            author_id: raw.author_id.clone(),
            author_display_name: raw.author_display_name.clone(),
            content,
            image_refs,
            platform_timestamp: raw.platform_timestamp,
            created_at: raw.platform_timestamp,
        };

        if raw.kind == RawMessageKind::ThreadStarter {
            return Ok(message);
        }

        let row_id = self.store.insert_message(&message).await?;
        let mut stored = message;
        stored.row_id = row_id;

        self.mirror.append(stored.clone(), raw.kind).await;

        let freezer = Freezer::new(
            self.store,
            self.mirror,
            self.chars_per_token,
            self.freeze_threshold_tokens,
        );
        freezer
            .maybe_freeze(&stored.channel_id, stored.thread_id.as_ref())
            .await?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ids::{AuthorId, ChannelId, MessageId};
    use crate::model::RawMessageKind;
    use chrono::Utc;
    use std::collections::HashMap;

    fn raw(channel: &ChannelId, message_id: &str, author: &str, content: &str, kind: RawMessageKind) -> RawMessage {
        RawMessage {
            id: MessageId::from(message_id),
            channel_id: channel.clone(),
            thread_id: None,
            parent_channel_id: channel.clone(),
            author_id: AuthorId::from(author),
            author_display_name: author.to_string(),
            content: content.to_string(),
            mentions: HashMap::new(),
            attachments: vec![],
            platform_timestamp: Utc::now(),
            kind,
        }
    }

    #[tokio::test]
    async fn thread_starter_notices_are_dropped_entirely() {
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

        ingest
            .ingest(
                raw(&channel, "m1", "u1", "started a thread", RawMessageKind::ThreadStarter),
                "bot",
                "Bot",
            )
            .await
            .unwrap();

        let stored = store.get_messages(&channel, None, None).await.unwrap();
        assert!(stored.is_empty(), "thread-starter notices are never persisted");

        let tail = mirror.channel_messages(&channel, None).await;
        assert!(tail.is_empty(), "thread-starter notices never appear in the mirror");
    }

    #[tokio::test]
    async fn thread_starter_notices_do_not_resurface_after_rehydration() {
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

        ingest
            .ingest(
                raw(&channel, "m1", "u1", "started a thread", RawMessageKind::ThreadStarter),
                "bot",
                "Bot",
            )
            .await
            .unwrap();
        ingest
            .ingest(raw(&channel, "m2", "u1", "hello", RawMessageKind::Default), "bot", "Bot")
            .await
            .unwrap();

        // Simulate a restart: a fresh mirror re-hydrated from the store.
        let fresh_mirror = Mirror::new();
        fresh_mirror.hydrate_if_needed(&store, &channel, None).await.unwrap();

        let tail = fresh_mirror.channel_messages(&channel, None).await;
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].content, "hello");
    }

    #[tokio::test]
    async fn normal_messages_are_stored_and_mirrored() {
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

        ingest
            .ingest(raw(&channel, "m1", "u1", "hello", RawMessageKind::Default), "bot", "Bot")
            .await
            .unwrap();

        assert_eq!(mirror.channel_messages(&channel, None).await.len(), 1);
    }
}
