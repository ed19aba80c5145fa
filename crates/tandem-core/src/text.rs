//! Token estimation and UTF-8–safe truncation helpers.
//!
//! Budget arithmetic never needs a real tokenizer; a chars/4 heuristic is
//! close enough for admission decisions and keeps this crate dependency-free.
//! Truncation always snaps to a char boundary so multi-byte characters are
//! never split.

/// Characters-per-token ratio used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text as `ceil(chars / 4)`.
///
/// Counts Unicode scalar values, not bytes. Empty input is zero tokens.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// Returns the longest prefix of `s` whose byte length is ≤ `max_bytes`
/// and that does not split a multi-byte character.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // `floor_char_boundary` is nightly-only, so implement it ourselves.
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate oversized tool output for transcript inclusion.
///
/// Output at or under `max_chars` characters is returned unchanged. Longer
/// output keeps the first `max_chars` characters and appends an explicit
/// truncation marker so the model knows content is missing.
#[must_use]
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_owned();
    }
    let kept: String = output.chars().take(max_chars).collect();
    format!("{kept}\n[Truncated: {total} chars total, showing first {max_chars}]")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
