//! Core data model: stored messages, frozen blocks, thread resets, and the
//! schemaless inbound message representation the chat-platform adapter
//! produces.

use crate::ids::{AuthorId, ChannelId, MessageId, RowId, ThreadId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An image attachment carried alongside a message's text content. Image
/// bytes are never inlined (only `text/*` attachments are); the URL is
/// surfaced to the provider transport at context-build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub filename: String,
}

/// A single attachment as delivered by the chat-platform adapter, before
/// the inliner has decided what to do with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAttachment {
    pub filename: String,
    pub mime_type: String,
    pub url: String,
    pub size_bytes: Option<u64>,
}

/// Discriminant for platform-synthesized message types. The mirror's
/// `append` silently drops `ThreadStarter` notices; everything else is
/// stored normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawMessageKind {
    /// An ordinary chat message.
    Default,
    /// Platform-synthesized "this thread was created" marker. Never stored.
    ThreadStarter,
}

/// Schemaless inbound message as produced by a `ChatAdapter`. Carries only
/// the fields the core actually consumes (see Design Notes: "dynamic
/// message objects").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub thread_id: Option<ThreadId>,
    pub parent_channel_id: ChannelId,
    pub author_id: AuthorId,
    pub author_display_name: String,
    pub content: String,
    /// Mention metadata carried with the message: user id -> resolved
    /// display name, per the normalizer's first resolution tier.
    pub mentions: HashMap<String, String>,
    pub attachments: Vec<RawAttachment>,
    pub platform_timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: RawMessageKind,
}

/// A durably stored, immutable message. `row_id` gives total ordering
/// within the store independent of the platform's own id scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub row_id: RowId,
    pub channel_id: ChannelId,
    pub thread_id: Option<ThreadId>,
    pub parent_channel_id: ChannelId,
    pub message_id: MessageId,
    pub author_id: AuthorId,
    pub author_display_name: String,
    /// Post-normalization, post-attachment-inlining content.
    pub content: String,
    pub image_refs: Vec<ImageRef>,
    pub platform_timestamp: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An immutable frozen prefix segment of a channel's history. Boundaries
/// are disjoint and cover a contiguous prefix ordered by `last_row_id`;
/// once written, never retroactively shrunk or rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockBoundary {
    pub channel_id: ChannelId,
    pub thread_id: Option<ThreadId>,
    pub first_message_id: MessageId,
    pub last_message_id: MessageId,
    pub first_row_id: RowId,
    pub last_row_id: RowId,
    pub token_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A thread reset anchor. At most one record per `(thread_id, bot_id)`;
/// lookups for a specific bot fall back to the `__GLOBAL__` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadResetRecord {
    pub thread_id: ThreadId,
    pub bot_id: String,
    pub last_reset_row_id: RowId,
    pub last_reset_message_id: Option<MessageId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of `getThreadResetInfo`: the floor below which history is
/// invisible for a given thread/bot pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetInfo {
    pub last_reset_row_id: RowId,
}

/// A single rendered turn in the context builder's tail output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TailTurn {
    pub role: Role,
    pub content: String,
}

/// Output of the context builder, ready for the provider transport.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuiltContext {
    pub cached_blocks: Vec<String>,
    pub tail: Vec<TailTurn>,
    pub image_blocks: Vec<ImageRef>,
}

/// Durable store health/size counters, exposed by `stats()`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub message_count: i64,
    pub boundary_count: i64,
    pub reset_count: i64,
}
