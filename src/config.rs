//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine-wide configuration recognized by the core (spec §6).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for context builder output, in estimated tokens.
    pub max_context_tokens: u64,

    /// Block freezer cutoff T_freeze, in estimated tokens.
    pub freeze_threshold_tokens: u64,

    /// Token estimation divisor: `estimateTokens(s) = ceil(len(s) / chars_per_token)`.
    pub chars_per_token: f64,

    /// Upper bound on tail length held in memory per channel.
    pub message_cache_limit: usize,

    /// Attachments larger than this are skipped by the inliner.
    pub attachment_max_bytes: u64,

    /// Bound on attachment fetch latency.
    pub attachment_fetch_timeout_ms: u64,

    /// SQLite database path. Ignored when `use_database_storage` is false.
    pub database_path: PathBuf,

    /// If false, history lives only in the mirror and is lost on restart.
    /// Test mode only — never set this in a real deployment.
    pub use_database_storage: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 180_000,
            freeze_threshold_tokens: 30_000,
            chars_per_token: 4.0,
            message_cache_limit: 500,
            attachment_max_bytes: 128 * 1024,
            attachment_fetch_timeout_ms: 15_000,
            database_path: default_data_dir().join("ctxbridge.db"),
            use_database_storage: true,
        }
    }
}

/// File-level overrides, deserialized from `ctxengine.toml`. Every field is
/// optional so a partial file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    max_context_tokens: Option<u64>,
    freeze_threshold_tokens: Option<u64>,
    chars_per_token: Option<f64>,
    message_cache_limit: Option<usize>,
    attachment_max_bytes: Option<u64>,
    attachment_fetch_timeout_ms: Option<u64>,
    database_path: Option<PathBuf>,
    use_database_storage: Option<bool>,
}

impl EngineConfig {
    /// Load defaults, then apply `ctxengine.toml` (if present) and then
    /// `CTXENGINE_*` environment variables, in that precedence order — env
    /// vars win over file values.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = find_config_file() {
            config.apply_file(&path)?;
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific config file path, then apply env overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let overrides: FileOverrides =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if let Some(v) = overrides.max_context_tokens {
            self.max_context_tokens = v;
        }
        if let Some(v) = overrides.freeze_threshold_tokens {
            self.freeze_threshold_tokens = v;
        }
        if let Some(v) = overrides.chars_per_token {
            self.chars_per_token = v;
        }
        if let Some(v) = overrides.message_cache_limit {
            self.message_cache_limit = v;
        }
        if let Some(v) = overrides.attachment_max_bytes {
            self.attachment_max_bytes = v;
        }
        if let Some(v) = overrides.attachment_fetch_timeout_ms {
            self.attachment_fetch_timeout_ms = v;
        }
        if let Some(v) = overrides.database_path {
            self.database_path = v;
        }
        if let Some(v) = overrides.use_database_storage {
            self.use_database_storage = v;
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64("CTXENGINE_MAX_CONTEXT_TOKENS") {
            self.max_context_tokens = v;
        }
        if let Some(v) = env_u64("CTXENGINE_FREEZE_THRESHOLD_TOKENS") {
            self.freeze_threshold_tokens = v;
        }
        if let Ok(v) = std::env::var("CTXENGINE_CHARS_PER_TOKEN")
            && let Ok(parsed) = v.parse()
        {
            self.chars_per_token = parsed;
        }
        if let Some(v) = env_u64("CTXENGINE_MESSAGE_CACHE_LIMIT") {
            self.message_cache_limit = v as usize;
        }
        if let Some(v) = env_u64("CTXENGINE_ATTACHMENT_MAX_BYTES") {
            self.attachment_max_bytes = v;
        }
        if let Some(v) = env_u64("CTXENGINE_ATTACHMENT_FETCH_TIMEOUT_MS") {
            self.attachment_fetch_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("CTXENGINE_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CTXENGINE_USE_DATABASE_STORAGE") {
            self.use_database_storage = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.chars_per_token <= 0.0 {
            return Err(ConfigError::Invalid("chars_per_token must be positive".into()).into());
        }
        if self.max_context_tokens == 0 {
            return Err(ConfigError::Invalid("max_context_tokens must be positive".into()).into());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn find_config_file() -> Option<PathBuf> {
    let candidate = PathBuf::from("ctxengine.toml");
    candidate.exists().then_some(candidate)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("ctxbridge"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
