//! Top-level error types for the context engine.

use crate::ids::{ChannelId, ThreadId};

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable store open/migrate/integrity errors. Per the error handling
/// policy in the spec, a `StoreUnavailable` or `IntegrityViolation`
/// encountered while opening the engine is fatal and aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Attachment inlining errors. Always swallowed by the caller — the message
/// is still stored without the attachment body — but kept as a typed error
/// so call sites can log the specific cause before discarding it.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment fetch timed out for {url}")]
    Timeout { url: String },

    #[error("attachment fetch returned status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("attachment {filename} exceeds size limit ({size} > {limit} bytes)")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("attachment {filename} is not valid UTF-8")]
    Decode { filename: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Chat-platform adapter errors raised during backfill/lazy load.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("failed to fetch thread {thread} messages: {reason}")]
    FetchFailed { thread: ThreadId, reason: String },

    #[error("failed to resolve display name for user {user_id}")]
    ResolveFailed { user_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Provider transport errors. Terminates the current job.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Failed(String),

    #[error("provider call cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Context-assembly errors.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("channel {channel} is not text-capable")]
    NotTextCapable { channel: ChannelId },

    #[error(
        "budget infeasible: newest tail message alone ({tokens} tokens) exceeds max_context_tokens ({budget})"
    )]
    BudgetInfeasible { tokens: u64, budget: u64 },
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
