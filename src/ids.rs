//! Identifier newtypes shared across the engine.
//!
//! Mirrors the teacher's `pub type ChannelId = Arc<str>;` style but wraps
//! each identifier in a distinct type so the compiler catches a channel id
//! passed where a thread id was expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! arc_str_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(Arc::from(value))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(Arc::from(value))
            }
        }
    };
}

arc_str_id!(ChannelId);
arc_str_id!(ThreadId);
arc_str_id!(MessageId);
arc_str_id!(AuthorId);
arc_str_id!(BotId);

/// Sentinel `bot_id` for a `ThreadResetRecord` that applies to every bot,
/// per the data model's `(thread_id, bot_id)` lookup rule.
pub const GLOBAL_BOT: &str = "__GLOBAL__";

/// Monotonically assigned local insertion order. Total ordering within the
/// store, independent of the platform's own `message_id` scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub i64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RowId {
    pub const ZERO: RowId = RowId(0);

    pub fn next(self) -> RowId {
        RowId(self.0 + 1)
    }
}
