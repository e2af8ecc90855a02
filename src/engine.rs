//! The `Engine` handle: the single entry point the embedding application
//! drives, replacing the module-level singletons the original design used.
//!
//! Grounded on the teacher's `AgentDeps` (a cloneable bundle of shared
//! subsystem handles passed into every channel) — here specialized to own
//! the store, mirror, member cache, and config for one bot.

use crate::adapter::ChatAdapter;
use crate::attachments::AttachmentInliner;
use crate::config::EngineConfig;
use crate::context::ContextBuilder;
use crate::error::Result;
use crate::ids::{ChannelId, ThreadId};
use crate::ingest::Ingest;
use crate::mentions::MemberCache;
use crate::mirror::Mirror;
use crate::model::{BuiltContext, Message, RawMessage, StoreStats};
use crate::queue::RequestQueue;
use crate::store::Store;
use crate::thread;
use std::sync::Arc;
use std::time::Duration;

/// Owns every piece of mutable state for one bot: the durable store, the
/// in-memory mirror, the member/display-name cache, and the per-channel
/// request queue. Cheap to clone — internals are `Arc`-backed.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    store: Store,
    mirror: Arc<Mirror>,
    member_cache: Arc<MemberCache>,
    inliner: Arc<AttachmentInliner>,
    queue: Arc<RequestQueue>,
}

impl Engine {
    /// Open the engine against `config`'s durable store, running schema
    /// migration if needed. A `StoreError` here is fatal for the caller —
    /// the spec treats a broken durable store as unrecoverable at startup.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config).await?;
        let inliner = AttachmentInliner::new(&config);
        let deadline = Duration::from_millis(config.attachment_fetch_timeout_ms.max(30_000));
        let message_cache_limit = config.message_cache_limit;

        Ok(Self {
            config: Arc::new(config),
            store,
            mirror: Arc::new(Mirror::with_limit(message_cache_limit)),
            member_cache: Arc::new(MemberCache::new()),
            inliner: Arc::new(inliner),
            queue: Arc::new(RequestQueue::new(deadline)),
        })
    }

    /// Build an in-memory engine for tests — no file ever touches disk.
    pub async fn for_testing() -> Result<Self> {
        Self::open(EngineConfig {
            use_database_storage: false,
            ..Default::default()
        })
        .await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn member_cache(&self) -> &MemberCache {
        &self.member_cache
    }

    fn ingest(&self) -> Ingest<'_> {
        Ingest {
            store: &self.store,
            mirror: &self.mirror,
            member_cache: &self.member_cache,
            inliner: &self.inliner,
            chars_per_token: self.config.chars_per_token,
            freeze_threshold_tokens: self.config.freeze_threshold_tokens,
        }
    }

    /// Ingest a single inbound message: normalize, inline attachments,
    /// persist, mirror, and run the freeze check.
    pub async fn on_message(&self, raw: RawMessage, adapter: &dyn ChatAdapter) -> Result<Message> {
        if raw.thread_id.is_some() {
            let thread = raw.thread_id.clone().expect("checked is_some above");
            thread::lazy_load_thread(&self.store, &self.mirror, &self.ingest(), adapter, &raw.channel_id, &thread)
                .await?;
        }
        self.ingest().ingest(raw, adapter.bot_id(), adapter.bot_display_name()).await
    }

    /// Reset a thread back to empty, anchored so history from before the
    /// reset never resurfaces (spec §4.8, invariant 3).
    pub async fn reset_thread(&self, thread: &ThreadId, bot: Option<&str>) -> Result<()> {
        thread::reset_thread(&self.store, &self.mirror, thread, bot).await
    }

    /// Build the context payload for a channel/thread, ready for a
    /// provider transport.
    pub async fn build_context(
        &self,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
        bot_id: &str,
        bot_display_name: &str,
        is_text_capable: bool,
    ) -> Result<BuiltContext> {
        let builder = ContextBuilder::new(&self.store, &self.mirror, self.config.max_context_tokens, self.config.chars_per_token);
        builder.build(channel, thread, bot_id, bot_display_name, is_text_capable).await
    }

    /// Submit a provider call to this channel/thread's FIFO queue.
    pub async fn submit<F>(&self, channel: &ChannelId, thread: Option<&ThreadId>, job: F) -> Result<String>
    where
        F: FnOnce() -> futures::future::BoxFuture<'static, Result<String>> + Send + 'static,
    {
        self.queue.submit(channel, thread, job).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }
}
