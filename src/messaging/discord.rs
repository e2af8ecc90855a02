//! Discord chat adapter using serenity.
//!
//! Grounded on the teacher's `messaging::discord::DiscordAdapter` — the
//! gateway setup, the `Handler::message` filtering, and the message-chunking
//! helper all carry over. The inbound side is generalized from the
//! teacher's "one `InboundMessage` enum" to this spec's dynamic
//! `RawMessage`, and the adapter now implements `ChatAdapter` directly
//! instead of the teacher's `Messaging` trait.

use crate::adapter::ChatAdapter;
use crate::error::{PlatformError, Result};
use crate::ids::{AuthorId, ChannelId, MessageId, ThreadId};
use crate::mentions::MemberCache;
use crate::model::{RawAttachment, RawMessage, RawMessageKind};
use anyhow::Context as _;
use async_trait::async_trait;
use serenity::all::{
    ChannelType, Context, EventHandler, GatewayIntents, GetMessages, Http, Message, Ready, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, RwLock};

/// Discord chat-platform adapter. Connects to the gateway for live inbound
/// messages and uses the REST API for backfill, display-name resolution,
/// and posting replies.
pub struct DiscordAdapter {
    token: String,
    http: RwLock<Option<Arc<Http>>>,
    /// Set once, from the gateway's `ready` event.
    bot_user_id: OnceLock<UserId>,
    bot_id_str: OnceLock<String>,
    bot_display_name: OnceLock<String>,
    member_cache: Arc<MemberCache>,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>, member_cache: Arc<MemberCache>) -> Self {
        Self {
            token: token.into(),
            http: RwLock::new(None),
            bot_user_id: OnceLock::new(),
            bot_id_str: OnceLock::new(),
            bot_display_name: OnceLock::new(),
            member_cache,
        }
    }

    /// Connect to the Discord gateway and return a stream of converted
    /// `RawMessage`s. The caller (the binary's main loop) drives ingestion,
    /// context building, the provider call, and the reply from there.
    pub async fn start(self: &Arc<Self>) -> Result<mpsc::Receiver<RawMessage>> {
        let (tx, rx) = mpsc::channel(256);

        let handler = Handler {
            tx,
            adapter: self.clone(),
        };

        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILDS;

        let mut client = serenity::Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .context("failed to build discord client")?;

        *self.http.write().await = Some(client.http.clone());

        tokio::spawn(async move {
            if let Err(error) = client.start().await {
                tracing::error!(%error, "discord gateway error");
            }
        });

        Ok(rx)
    }

    async fn http(&self) -> Result<Arc<Http>> {
        self.http
            .read()
            .await
            .clone()
            .ok_or_else(|| PlatformError::Other(anyhow::anyhow!("discord gateway not connected")).into())
    }
}

#[async_trait]
impl ChatAdapter for DiscordAdapter {
    fn bot_id(&self) -> &str {
        self.bot_id_str.get().map(String::as_str).unwrap_or("")
    }

    fn bot_display_name(&self) -> &str {
        self.bot_display_name.get().map(String::as_str).unwrap_or("")
    }

    async fn is_text_capable(&self, channel: &ChannelId, _thread: Option<&ThreadId>) -> bool {
        let Ok(http) = self.http().await else {
            return false;
        };
        let Ok(id) = channel.as_str().parse::<u64>() else {
            return false;
        };
        match http.get_channel(serenity::all::ChannelId::new(id)).await {
            Ok(channel) => !matches!(
                channel.guild(),
                Some(guild_channel) if guild_channel.kind == ChannelType::Voice || guild_channel.kind == ChannelType::Stage
            ),
            Err(_) => false,
        }
    }

    async fn resolve_display_name(&self, user_id: &str) -> Result<String> {
        if let Some(cached) = self.member_cache.get(user_id) {
            return Ok(cached);
        }

        let http = self.http().await?;
        let id: u64 = user_id
            .parse()
            .map_err(|_| PlatformError::ResolveFailed { user_id: user_id.to_string() })?;

        let user = http
            .get_user(UserId::new(id))
            .await
            .map_err(|_| PlatformError::ResolveFailed { user_id: user_id.to_string() })?;

        let name = user.global_name.unwrap_or(user.name);
        self.member_cache.upsert(user_id, name.clone());
        Ok(name)
    }

    async fn fetch_thread_messages_since(
        &self,
        thread: &ThreadId,
        after: Option<&str>,
    ) -> Result<Vec<RawMessage>> {
        let http = self.http().await?;
        let id: u64 = thread
            .as_str()
            .parse()
            .map_err(|_| PlatformError::FetchFailed { thread: thread.clone(), reason: "invalid thread id".into() })?;
        let channel_id = serenity::all::ChannelId::new(id);

        let mut out = Vec::new();
        let mut before: Option<serenity::all::MessageId> = None;

        loop {
            let mut builder = GetMessages::new().limit(100);
            if let Some(before_id) = before {
                builder = builder.before(before_id);
            }

            let page = channel_id
                .messages(&*http, builder)
                .await
                .map_err(|e| PlatformError::FetchFailed { thread: thread.clone(), reason: e.to_string() })?;

            if page.is_empty() {
                break;
            }

            before = page.last().map(|m| m.id);
            let reached_floor = after.is_some_and(|floor| page.iter().any(|m| m.id.to_string() == floor));

            for message in &page {
                if after.is_some_and(|floor| message.id.to_string() == floor) {
                    continue;
                }
                out.push(to_raw_message(message, Some(thread.clone())));
            }

            if reached_floor || page.len() < 100 {
                break;
            }
        }

        out.reverse();
        Ok(out)
    }

    async fn post_reply(&self, channel: &ChannelId, _thread: Option<&ThreadId>, content: &str) -> Result<()> {
        let http = self.http().await?;
        let id: u64 = channel
            .as_str()
            .parse()
            .map_err(|_| PlatformError::FetchFailed { thread: ThreadId::from(channel.as_str()), reason: "invalid channel id".into() })?;

        for chunk in split_message(content, 2000) {
            serenity::all::ChannelId::new(id)
                .say(&*http, &chunk)
                .await
                .map_err(|e| PlatformError::Other(e.into()))?;
        }
        Ok(())
    }
}

fn to_raw_message(message: &Message, thread_id: Option<ThreadId>) -> RawMessage {
    let mentions: HashMap<String, String> = message
        .mentions
        .iter()
        .map(|u| {
            let name = u.global_name.clone().unwrap_or_else(|| u.name.clone());
            (u.id.to_string(), name)
        })
        .collect();

    let attachments = message
        .attachments
        .iter()
        .map(|a| RawAttachment {
            filename: a.filename.clone(),
            mime_type: a
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            url: a.url.clone(),
            size_bytes: Some(a.size as u64),
        })
        .collect();

    let display_name = message
        .author
        .global_name
        .clone()
        .unwrap_or_else(|| message.author.name.clone());

    RawMessage {
        id: MessageId::from(message.id.to_string()),
        channel_id: ChannelId::from(message.channel_id.to_string()),
        thread_id,
        parent_channel_id: ChannelId::from(message.channel_id.to_string()),
        author_id: AuthorId::from(message.author.id.to_string()),
        author_display_name: display_name,
        content: message.content.clone(),
        mentions,
        attachments,
        platform_timestamp: *message.timestamp,
        kind: RawMessageKind::Default,
    }
}

/// Split `text` into chunks no longer than `max_len` bytes, breaking on
/// newlines, then spaces, then a hard cut at a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let safe_max = {
            let mut i = max_len.min(remaining.len());
            while !remaining.is_char_boundary(i) {
                i -= 1;
            }
            i
        };

        let split_at = remaining[..safe_max]
            .rfind('\n')
            .or_else(|| remaining[..safe_max].rfind(' '))
            .unwrap_or(safe_max);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

struct Handler {
    tx: mpsc::Sender<RawMessage>,
    adapter: Arc<DiscordAdapter>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(bot_name = %ready.user.name, "discord connected");
        let _ = self.adapter.bot_user_id.set(ready.user.id);
        let _ = self.adapter.bot_id_str.set(ready.user.id.to_string());
        let _ = self
            .adapter
            .bot_display_name
            .set(ready.user.global_name.clone().unwrap_or(ready.user.name.clone()));
    }

    async fn message(&self, _ctx: Context, message: Message) {
        if self.adapter.bot_user_id.get().is_some_and(|id| *id == message.author.id) {
            return;
        }

        if message.author.bot {
            return;
        }

        let thread_id = if matches!(
            message.channel_id.to_channel(&_ctx.http).await.ok().and_then(|c| c.guild().map(|g| g.kind)),
            Some(ChannelType::PublicThread) | Some(ChannelType::PrivateThread)
        ) {
            Some(ThreadId::from(message.channel_id.to_string()))
        } else {
            None
        };

        let raw = to_raw_message(&message, thread_id);
        if let Err(error) = self.tx.send(raw).await {
            tracing::warn!(%error, "failed to forward inbound discord message (receiver dropped)");
        }
    }
}
