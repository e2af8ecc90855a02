//! Adapter and transport trait boundaries: the seams between the
//! platform-agnostic core and a concrete chat platform / model provider.
//!
//! Grounded on the teacher's `messaging::traits` (a `MessagingAdapter` the
//! channel loop calls out through) and `llm::SpacebotModel` (a provider
//! abstraction behind `rig`'s `CompletionModel`), generalized to the
//! dynamic `RawMessage` representation and `BuiltContext` payload this spec
//! uses instead.

use crate::error::Result;
use crate::ids::{ChannelId, ThreadId};
use crate::model::{BuiltContext, RawMessage};
use async_trait::async_trait;

/// Everything the core needs from a chat platform, without depending on any
/// platform's SDK types directly.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// This adapter's bot id, used for self-mention and role tagging.
    fn bot_id(&self) -> &str;

    /// This adapter's bot display name, substituted for self-mentions.
    fn bot_display_name(&self) -> &str;

    /// Whether `channel`/`thread` can currently receive a text reply.
    async fn is_text_capable(&self, channel: &ChannelId, thread: Option<&ThreadId>) -> bool;

    /// Resolve a user id to a display name, used when neither a message's
    /// own mention metadata nor the member cache has an answer.
    async fn resolve_display_name(&self, user_id: &str) -> Result<String>;

    /// Fetch a thread's messages with id greater than `after`, oldest first,
    /// paginating internally until the thread is exhausted. Used by lazy
    /// hydration and post-reset backfill.
    async fn fetch_thread_messages_since(
        &self,
        thread: &ThreadId,
        after: Option<&str>,
    ) -> Result<Vec<RawMessage>>;

    /// Post a reply to `channel`/`thread`.
    async fn post_reply(&self, channel: &ChannelId, thread: Option<&ThreadId>, content: &str) -> Result<()>;
}

/// Everything the core needs from a model provider.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Send a built context to the provider and return its reply text.
    /// Implementations should respect the ambient task's cancellation (the
    /// request queue enforces the wall-clock deadline around this call).
    async fn send(&self, context: &BuiltContext) -> Result<String>;
}
