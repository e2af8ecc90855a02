//! Durable store: the single-writer, multi-reader SQLite-backed record of
//! every observed message, frozen block boundary, and thread reset point.
//!
//! Schema mirrors spec §6 exactly: `messages`, `block_boundaries`,
//! `thread_resets`, and a singleton `schema_version` row.

use crate::config::EngineConfig;
use crate::error::{Result, StoreError};
use crate::ids::{AuthorId, ChannelId, MessageId, RowId, ThreadId, GLOBAL_BOT};
use crate::model::{BlockBoundary, ImageRef, Message, ResetInfo, StoreStats, ThreadResetRecord};
use anyhow::Context as _;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row as _, SqlitePool};
use std::str::FromStr;

/// Current schema version. Migrations are forward-only: `Store::open`
/// refuses to downgrade and applies any version gap it recognizes.
const SCHEMA_VERSION: i64 = 1;

/// Durable, single-writer store for conversation history.
///
/// Reads may run concurrently with each other but never with a write — the
/// pool is capped at a single connection so that guarantee is structural,
/// matching the concurrency model in spec §5.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the durable store at `config.database_path`.
    /// When `config.use_database_storage` is false, an in-memory SQLite
    /// database backs the store instead — test mode only, history does not
    /// survive a restart.
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let options = if config.use_database_storage {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
            SqliteConnectOptions::from_str(&format!(
                "sqlite://{}",
                config.database_path.display()
            ))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        } else {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
        };

        // Single connection: makes the single-writer guarantee structural
        // rather than advisory. In-memory databases additionally require a
        // single connection or each connection sees a distinct empty DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Build a store around an already-open pool. Used by tests that want
    /// to share a pool across a `Store` and other subsystems.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id TEXT NOT NULL,
                thread_id TEXT,
                parent_channel_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                content TEXT NOT NULL,
                image_refs TEXT NOT NULL DEFAULT '[]',
                platform_timestamp TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(channel_id, message_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS block_boundaries (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id TEXT NOT NULL,
                thread_id TEXT,
                first_message_id TEXT NOT NULL,
                last_message_id TEXT NOT NULL,
                first_row_id INTEGER NOT NULL,
                last_row_id INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS thread_resets (
                thread_id TEXT NOT NULL,
                bot_id TEXT NOT NULL DEFAULT '__GLOBAL__',
                last_reset_row_id INTEGER NOT NULL,
                last_reset_message_id TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY(thread_id, bot_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_channel_thread_row \
             ON messages(channel_id, thread_id, row_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_boundaries_channel_thread_last \
             ON block_boundaries(channel_id, thread_id, last_row_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        match existing {
            None => {
                sqlx::query("INSERT INTO schema_version (id, version) VALUES (0, ?)")
                    .bind(SCHEMA_VERSION)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Migration(e.to_string()))?;
            }
            Some(version) if version > SCHEMA_VERSION => {
                return Err(StoreError::IntegrityViolation(format!(
                    "database schema version {version} is newer than this build supports ({SCHEMA_VERSION})"
                ))
                .into());
            }
            Some(_) => {
                // At or behind current version with no migrations defined yet
                // beyond v1 — forward-only migrations would run here.
            }
        }

        Ok(())
    }

    /// Insert a message, returning its assigned `row_id`. Idempotent on
    /// duplicate `(channel_id, message_id)`: returns the existing `row_id`
    /// without modifying content.
    pub async fn insert_message(&self, m: &Message) -> Result<RowId> {
        let image_refs_json = serde_json::to_string(&m.image_refs)
            .context("failed to serialize image_refs")?;

        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                channel_id, thread_id, parent_channel_id, message_id,
                author_id, author_name, content, image_refs,
                platform_timestamp, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id, message_id) DO NOTHING
            "#,
        )
        .bind(m.channel_id.as_str())
        .bind(m.thread_id.as_ref().map(|t| t.as_str()))
        .bind(m.parent_channel_id.as_str())
        .bind(m.message_id.as_str())
        .bind(m.author_id.as_str())
        .bind(&m.author_display_name)
        .bind(&m.content)
        .bind(&image_refs_json)
        .bind(m.platform_timestamp)
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(RowId(result.last_insert_rowid()));
        }

        // Duplicate append: fetch the row_id of the existing row.
        let row_id: i64 = sqlx::query_scalar(
            "SELECT row_id FROM messages WHERE channel_id = ? AND message_id = ?",
        )
        .bind(m.channel_id.as_str())
        .bind(m.message_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(RowId(row_id))
    }

    /// Fetch messages for a channel (optionally scoped to a thread), in
    /// `row_id` order, strictly after `after_row_id` when given.
    pub async fn get_messages(
        &self,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
        after_row_id: Option<RowId>,
    ) -> Result<Vec<Message>> {
        let rows = match (thread, after_row_id) {
            (Some(thread), Some(after)) => {
                sqlx::query(MESSAGE_SELECT_THREAD_AFTER)
                    .bind(channel.as_str())
                    .bind(thread.as_str())
                    .bind(after.0)
                    .fetch_all(&self.pool)
                    .await
            }
            (Some(thread), None) => {
                sqlx::query(MESSAGE_SELECT_THREAD)
                    .bind(channel.as_str())
                    .bind(thread.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            (None, Some(after)) => {
                sqlx::query(MESSAGE_SELECT_CHANNEL_AFTER)
                    .bind(channel.as_str())
                    .bind(after.0)
                    .fetch_all(&self.pool)
                    .await
            }
            (None, None) => {
                sqlx::query(MESSAGE_SELECT_CHANNEL)
                    .bind(channel.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(row_to_message).collect()
    }

    /// Fetch messages for a channel/thread whose `row_id` falls within
    /// `[first, last]` inclusive — used to re-render a cached block's text.
    pub async fn get_messages_in_range(
        &self,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
        first: RowId,
        last: RowId,
    ) -> Result<Vec<Message>> {
        let mut query = String::from(
            "SELECT row_id, channel_id, thread_id, parent_channel_id, message_id, author_id, \
             author_name, content, image_refs, platform_timestamp, created_at FROM messages \
             WHERE channel_id = ? AND row_id >= ? AND row_id <= ?",
        );
        if thread.is_some() {
            query.push_str(" AND thread_id = ?");
        } else {
            query.push_str(" AND thread_id IS NULL");
        }
        query.push_str(" ORDER BY row_id ASC");

        let mut q = sqlx::query(&query)
            .bind(channel.as_str())
            .bind(first.0)
            .bind(last.0);
        if let Some(thread) = thread {
            q = q.bind(thread.as_str());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(row_to_message).collect()
    }

    /// Highest `row_id` recorded for any message in this thread, across all
    /// channels (thread ids are globally unique). Used to anchor a reset.
    pub async fn max_row_id_for_thread(&self, thread: &ThreadId) -> Result<RowId> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(row_id) FROM messages WHERE thread_id = ?")
            .bind(thread.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(RowId(max.unwrap_or(0)))
    }

    /// Persist a newly frozen block boundary.
    pub async fn insert_block_boundary(&self, b: &BlockBoundary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO block_boundaries (
                channel_id, thread_id, first_message_id, last_message_id,
                first_row_id, last_row_id, token_count, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(b.channel_id.as_str())
        .bind(b.thread_id.as_ref().map(|t| t.as_str()))
        .bind(b.first_message_id.as_str())
        .bind(b.last_message_id.as_str())
        .bind(b.first_row_id.0)
        .bind(b.last_row_id.0)
        .bind(b.token_count as i64)
        .bind(b.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    /// Fetch boundaries for a channel (optionally scoped to a thread),
    /// ordered by `last_row_id`, strictly after `after_row_id` when given.
    pub async fn get_boundaries(
        &self,
        channel: &ChannelId,
        thread: Option<&ThreadId>,
        after_row_id: Option<RowId>,
    ) -> Result<Vec<BlockBoundary>> {
        let mut query = String::from(
            "SELECT channel_id, thread_id, first_message_id, last_message_id, \
             first_row_id, last_row_id, token_count, created_at \
             FROM block_boundaries WHERE channel_id = ?",
        );
        if thread.is_some() {
            query.push_str(" AND thread_id = ?");
        } else {
            query.push_str(" AND thread_id IS NULL");
        }
        if after_row_id.is_some() {
            query.push_str(" AND last_row_id > ?");
        }
        query.push_str(" ORDER BY last_row_id ASC");

        let mut q = sqlx::query(&query).bind(channel.as_str());
        if let Some(thread) = thread {
            q = q.bind(thread.as_str());
        }
        if let Some(after) = after_row_id {
            q = q.bind(after.0);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(row_to_boundary).collect()
    }

    /// Record a thread reset, anchored at `row_id`/`message_id`. Overwrites
    /// any existing record for the same `(thread_id, bot_id)`.
    pub async fn record_thread_reset(
        &self,
        thread: &ThreadId,
        row_id: RowId,
        message_id: Option<&MessageId>,
        bot: Option<&str>,
    ) -> Result<()> {
        let bot_id = bot.unwrap_or(GLOBAL_BOT);
        sqlx::query(
            r#"
            INSERT INTO thread_resets (thread_id, bot_id, last_reset_row_id, last_reset_message_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(thread_id, bot_id) DO UPDATE SET
                last_reset_row_id = excluded.last_reset_row_id,
                last_reset_message_id = excluded.last_reset_message_id,
                created_at = excluded.created_at
            "#,
        )
        .bind(thread.as_str())
        .bind(bot_id)
        .bind(row_id.0)
        .bind(message_id.map(|m| m.as_str()))
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    /// Look up the reset anchor for a thread, falling back to the
    /// `__GLOBAL__` sentinel when no bot-specific record exists.
    pub async fn get_thread_reset_info(
        &self,
        thread: &ThreadId,
        bot: Option<&str>,
    ) -> Result<Option<ResetInfo>> {
        if let Some(bot_id) = bot
            && let Some(record) = self.get_thread_reset_record(thread, bot_id).await?
        {
            return Ok(Some(ResetInfo {
                last_reset_row_id: record.last_reset_row_id,
            }));
        }

        Ok(self
            .get_thread_reset_record(thread, GLOBAL_BOT)
            .await?
            .map(|r| ResetInfo {
                last_reset_row_id: r.last_reset_row_id,
            }))
    }

    async fn get_thread_reset_record(
        &self,
        thread: &ThreadId,
        bot_id: &str,
    ) -> Result<Option<ThreadResetRecord>> {
        let row = sqlx::query(
            "SELECT thread_id, bot_id, last_reset_row_id, last_reset_message_id, created_at \
             FROM thread_resets WHERE thread_id = ? AND bot_id = ?",
        )
        .bind(thread.as_str())
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        row.map(row_to_reset).transpose()
    }

    /// Delete a thread's messages and boundaries from the durable store.
    /// Does not remove its reset record(s) — those anchor future loads.
    pub async fn clear_thread(&self, thread: &ThreadId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(thread.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query("DELETE FROM block_boundaries WHERE thread_id = ?")
            .bind(thread.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    /// Size counters for operator-visible health checks.
    pub async fn stats(&self) -> Result<StoreStats> {
        let message_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let boundary_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block_boundaries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let reset_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thread_resets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(StoreStats {
            message_count,
            boundary_count,
            reset_count,
        })
    }

    /// Wipe every table. Used by tests and the `use_database_storage =
    /// false` test-mode reset path.
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM messages")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        sqlx::query("DELETE FROM block_boundaries")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        sqlx::query("DELETE FROM thread_resets")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    async fn memory_store() -> Store {
        let config = EngineConfig {
            use_database_storage: false,
            ..Default::default()
        };
        Store::open(&config).await.unwrap()
    }

    fn message(channel: &str, message_id: &str, content: &str) -> Message {
        Message {
            row_id: RowId::ZERO,
            channel_id: ChannelId::from(channel),
            thread_id: None,
            parent_channel_id: ChannelId::from(channel),
            message_id: MessageId::from(message_id),
            author_id: AuthorId::from("author"),
            author_display_name: "Author".to_string(),
            content: content.to_string(),
            image_refs: vec![],
            platform_timestamp: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn inserting_the_same_message_twice_is_idempotent() {
        let store = memory_store().await;
        let m = message("c1", "msg-1", "hello");

        let first = store.insert_message(&m).await.unwrap();
        let second = store.insert_message(&m).await.unwrap();
        assert_eq!(first, second);

        let all = store.get_messages(&m.channel_id, None, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn messages_round_trip_through_a_reopened_file_store() {
        let dir = std::env::temp_dir().join(format!("ctxbridge-test-{}", uuid::Uuid::new_v4()));
        let db_path = dir.join("store.db");
        let config = EngineConfig {
            use_database_storage: true,
            database_path: db_path.clone(),
            ..Default::default()
        };

        let channel = ChannelId::from("c1");
        {
            let store = Store::open(&config).await.unwrap();
            let m = message("c1", "msg-1", "hello");
            store.insert_message(&m).await.unwrap();
        }

        // Reopening at the same path must see the previously written row —
        // this is the restart-persistence guarantee (invariant 5).
        {
            let store = Store::open(&config).await.unwrap();
            let rows = store.get_messages(&channel, None, None).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].content, "hello");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn thread_reset_falls_back_to_global_bot_record() {
        let store = memory_store().await;
        let thread = ThreadId::from("t1");
        store
            .record_thread_reset(&thread, RowId(5), None, None)
            .await
            .unwrap();

        let info = store
            .get_thread_reset_info(&thread, Some("some-bot"))
            .await
            .unwrap()
            .expect("falls back to global record");
        assert_eq!(info.last_reset_row_id, RowId(5));
    }

    #[tokio::test]
    async fn clear_thread_deletes_messages_but_keeps_reset_anchor() {
        let store = memory_store().await;
        let thread = ThreadId::from("t1");
        let mut m = message("c1", "msg-1", "hi");
        m.thread_id = Some(thread.clone());
        store.insert_message(&m).await.unwrap();
        store
            .record_thread_reset(&thread, RowId(1), None, None)
            .await
            .unwrap();

        store.clear_thread(&thread).await.unwrap();

        let rows = store
            .get_messages(&m.channel_id, Some(&thread), None)
            .await
            .unwrap();
        assert!(rows.is_empty());

        let info = store.get_thread_reset_info(&thread, None).await.unwrap();
        assert!(info.is_some());
    }
}

const MESSAGE_SELECT_CHANNEL: &str = "SELECT row_id, channel_id, thread_id, parent_channel_id, \
     message_id, author_id, author_name, content, image_refs, platform_timestamp, created_at \
     FROM messages WHERE channel_id = ? AND thread_id IS NULL ORDER BY row_id ASC";
const MESSAGE_SELECT_CHANNEL_AFTER: &str =
    "SELECT row_id, channel_id, thread_id, parent_channel_id, message_id, author_id, \
     author_name, content, image_refs, platform_timestamp, created_at FROM messages \
     WHERE channel_id = ? AND thread_id IS NULL AND row_id > ? ORDER BY row_id ASC";
const MESSAGE_SELECT_THREAD: &str =
    "SELECT row_id, channel_id, thread_id, parent_channel_id, message_id, author_id, \
     author_name, content, image_refs, platform_timestamp, created_at FROM messages \
     WHERE channel_id = ? AND thread_id = ? ORDER BY row_id ASC";
const MESSAGE_SELECT_THREAD_AFTER: &str =
    "SELECT row_id, channel_id, thread_id, parent_channel_id, message_id, author_id, \
     author_name, content, image_refs, platform_timestamp, created_at FROM messages \
     WHERE channel_id = ? AND thread_id = ? AND row_id > ? ORDER BY row_id ASC";

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> Result<Message> {
    let thread_id: Option<String> = row
        .try_get("thread_id")
        .map_err(|e| StoreError::Query(e.to_string()))?;
    let image_refs_json: String = row
        .try_get("image_refs")
        .map_err(|e| StoreError::Query(e.to_string()))?;
    let image_refs: Vec<ImageRef> =
        serde_json::from_str(&image_refs_json).unwrap_or_default();

    Ok(Message {
        row_id: RowId(
            row.try_get("row_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        channel_id: ChannelId::from(
            row.try_get::<String, _>("channel_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        thread_id: thread_id.map(ThreadId::from),
        parent_channel_id: ChannelId::from(
            row.try_get::<String, _>("parent_channel_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        message_id: MessageId::from(
            row.try_get::<String, _>("message_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        author_id: AuthorId::from(
            row.try_get::<String, _>("author_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        author_display_name: row
            .try_get("author_name")
            .map_err(|e| StoreError::Query(e.to_string()))?,
        content: row
            .try_get("content")
            .map_err(|e| StoreError::Query(e.to_string()))?,
        image_refs,
        platform_timestamp: row
            .try_get("platform_timestamp")
            .map_err(|e| StoreError::Query(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Query(e.to_string()))?,
    })
}

fn row_to_boundary(row: sqlx::sqlite::SqliteRow) -> Result<BlockBoundary> {
    let thread_id: Option<String> = row
        .try_get("thread_id")
        .map_err(|e| StoreError::Query(e.to_string()))?;
    let token_count: i64 = row
        .try_get("token_count")
        .map_err(|e| StoreError::Query(e.to_string()))?;

    Ok(BlockBoundary {
        channel_id: ChannelId::from(
            row.try_get::<String, _>("channel_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        thread_id: thread_id.map(ThreadId::from),
        first_message_id: MessageId::from(
            row.try_get::<String, _>("first_message_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        last_message_id: MessageId::from(
            row.try_get::<String, _>("last_message_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        first_row_id: RowId(
            row.try_get("first_row_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        last_row_id: RowId(
            row.try_get("last_row_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        token_count: token_count as u64,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Query(e.to_string()))?,
    })
}

fn row_to_reset(row: sqlx::sqlite::SqliteRow) -> Result<ThreadResetRecord> {
    let last_reset_message_id: Option<String> = row
        .try_get("last_reset_message_id")
        .map_err(|e| StoreError::Query(e.to_string()))?;

    Ok(ThreadResetRecord {
        thread_id: ThreadId::from(
            row.try_get::<String, _>("thread_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        bot_id: row
            .try_get("bot_id")
            .map_err(|e| StoreError::Query(e.to_string()))?,
        last_reset_row_id: RowId(
            row.try_get("last_reset_row_id")
                .map_err(|e| StoreError::Query(e.to_string()))?,
        ),
        last_reset_message_id: last_reset_message_id.map(MessageId::from),
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Query(e.to_string()))?,
    })
}

