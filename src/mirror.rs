//! In-memory mirror: low-latency "hot" channel state for context assembly.
//!
//! Each channel's state is guarded independently (reader/writer discipline)
//! rather than behind one global lock, so unrelated channels never
//! contend — matching the concurrency model in spec §5.

use crate::error::Result;
use crate::ids::{ChannelId, RowId, ThreadId};
use crate::model::{BlockBoundary, Message, RawMessageKind};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-channel hot state: the tail (messages since the last boundary) plus
/// a cached list of boundaries for that channel.
#[derive(Debug, Default, Clone)]
struct ChannelState {
    tail: Vec<Message>,
    boundaries: Vec<BlockBoundary>,
    hydrated: bool,
}

/// Key a channel's hot state by channel id and, when the channel is a
/// thread, also by thread id — a thread's mirror state is independent of
/// its parent channel's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MirrorKey {
    channel: ChannelId,
    thread: Option<ThreadId>,
}

/// Holds "hot" channel state mirroring the durable store. Lazy-hydrated on
/// first access.
pub struct Mirror {
    channels: RwLock<HashMap<MirrorKey, Arc<RwLock<ChannelState>>>>,
    tail_limit: usize,
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

impl Mirror {
    /// A mirror with no tail cap — only use where `message_cache_limit` is
    /// not meaningful (tests, a standalone cache).
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            tail_limit: usize::MAX,
        }
    }

    /// A mirror that evicts oldest uncovered tail entries past `limit`
    /// (spec §6's `message_cache_limit`).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            tail_limit: limit.max(1),
        }
    }

    async fn state_for(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> Arc<RwLock<ChannelState>> {
        let key = MirrorKey {
            channel: channel.clone(),
            thread: thread.cloned(),
        };

        if let Some(state) = self.channels.read().await.get(&key) {
            return state.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(ChannelState::default())))
            .clone()
    }

    /// Append a message to the mirror's tail. Silently drops
    /// platform-synthesized thread-starter notices. Evicts the oldest tail
    /// entries once the tail grows past `message_cache_limit` — this only
    /// bounds the in-memory cache, the durable store still has the full
    /// history.
    pub async fn append(&self, message: Message, kind: RawMessageKind) {
        if kind == RawMessageKind::ThreadStarter {
            return;
        }

        let state = self.state_for(&message.channel_id, message.thread_id.as_ref()).await;
        let mut state = state.write().await;
        state.tail.push(message);
        if state.tail.len() > self.tail_limit {
            let overflow = state.tail.len() - self.tail_limit;
            state.tail.drain(0..overflow);
        }
    }

    /// Record a newly frozen boundary and drop the tail messages it now
    /// covers. Atomic relative to concurrent appends on the same channel —
    /// both hold the same per-channel write lock, so an append either sees
    /// the pre-freeze tail or the post-freeze empty tail, never a
    /// half-frozen state.
    pub async fn freeze(&self, boundary: BlockBoundary) {
        let state = self
            .state_for(&boundary.channel_id, boundary.thread_id.as_ref())
            .await;
        let mut state = state.write().await;
        state
            .tail
            .retain(|m| m.row_id > boundary.last_row_id);
        state.boundaries.push(boundary);
    }

    /// Current tail messages for a channel/thread, in `row_id` order.
    pub async fn channel_messages(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> Vec<Message> {
        let state = self.state_for(channel, thread).await;
        state.read().await.tail.clone()
    }

    /// Cached boundaries for a channel/thread, ordered by `last_row_id`.
    pub async fn boundaries(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> Vec<BlockBoundary> {
        let state = self.state_for(channel, thread).await;
        state.read().await.boundaries.clone()
    }

    pub async fn is_hydrated(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> bool {
        let state = self.state_for(channel, thread).await;
        state.read().await.hydrated
    }

    /// Populate hot state for a channel/thread from the durable store.
    /// Loads all boundaries plus tail messages with `row_id` greater than
    /// the last boundary's, respecting any thread reset floor. Idempotent:
    /// re-hydrating simply replaces hot state with what the store now
    /// contains.
    pub async fn hydrate(&self, store: &Store, channel: &ChannelId, thread: Option<&ThreadId>) -> Result<()> {
        let reset_floor = if let Some(thread) = thread {
            store
                .get_thread_reset_info(thread, None)
                .await?
                .map(|r| r.last_reset_row_id)
        } else {
            None
        };

        let boundaries = store.get_boundaries(channel, thread, reset_floor).await?;
        let tail_floor = boundaries
            .last()
            .map(|b| b.last_row_id)
            .or(reset_floor);

        let tail = store.get_messages(channel, thread, tail_floor).await?;

        let state = self.state_for(channel, thread).await;
        let mut state = state.write().await;
        state.boundaries = boundaries;
        state.tail = tail;
        state.hydrated = true;

        Ok(())
    }

    /// Hydrate only if this channel/thread has never been loaded.
    pub async fn hydrate_if_needed(
        &self,
        store: &Store,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
    ) -> Result<()> {
        if !self.is_hydrated(channel, thread).await {
            self.hydrate(store, channel, thread).await?;
        }
        Ok(())
    }

    /// Drop all hot state for a thread (used by `resetThread`).
    pub async fn clear_thread(&self, thread: &ThreadId) {
        let mut channels = self.channels.write().await;
        channels.retain(|key, _| key.thread.as_ref() != Some(thread));
    }

    /// Drop all hot state. Used by tests and full resets.
    pub async fn clear_all(&self) {
        self.channels.write().await.clear();
    }
}

/// Compute the tail minus any rows already covered by the newest boundary —
/// the quantity the freezer sums over. The mirror already maintains this
/// invariant (tail is disjoint from boundaries), so this just returns the
/// current tail unfiltered; kept as a named helper so call sites read like
/// the spec's algorithm steps.
pub fn uncovered_tail(tail: &[Message], boundaries: &[BlockBoundary]) -> Vec<Message> {
    let floor = boundaries.last().map(|b| b.last_row_id).unwrap_or(RowId::ZERO);
    tail.iter()
        .filter(|m| m.row_id > floor)
        .cloned()
        .collect()
}
