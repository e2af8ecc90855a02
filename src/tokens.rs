//! Token estimation shared by the freezer and the context builder.
//!
//! The freezer and the context builder must agree on token counts, or the
//! "boundary tokens stay stable" caching invariant breaks (spec Design
//! Notes, open question on tokenizer drift). Both call through here.

/// Per-message overhead added on top of content length, accounting for the
/// `"<display>: "` prefix and framing a provider adds per turn.
pub const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

/// `estimateTokens(s) = ceil(len(s) / chars_per_token)`.
pub fn estimate_tokens(content: &str, chars_per_token: f64) -> u64 {
    if content.is_empty() {
        return 0;
    }
    (content.chars().count() as f64 / chars_per_token).ceil() as u64
}

/// Token estimate for a single stored message, including per-message
/// overhead — the quantity the freezer sums over the tail.
pub fn estimate_message_tokens(content: &str, chars_per_token: f64) -> u64 {
    estimate_tokens(content, chars_per_token) + MESSAGE_OVERHEAD_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_zero_tokens() {
        assert_eq!(estimate_tokens("", 4.0), 0);
    }

    #[test]
    fn rounds_up_to_next_token() {
        assert_eq!(estimate_tokens("abcde", 4.0), 2);
        assert_eq!(estimate_tokens("abcd", 4.0), 1);
    }

    #[test]
    fn message_overhead_is_additive() {
        assert_eq!(
            estimate_message_tokens("abcd", 4.0),
            1 + MESSAGE_OVERHEAD_TOKENS
        );
    }
}
