//! Cleanup of raw model replies before they are stored.
//!
//! The stored reply is the provider's answer as given: only leaked
//! `<think>` reasoning blocks are removed and the ends are trimmed.
//! Fences, inner whitespace and line endings are left alone so code
//! answers survive into the transcript and the export unchanged.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply the cleanup rules to a raw reply.
///
/// Rules (applied in order):
/// 1. Drop `<think>…</think>` reasoning blocks
/// 2. Trim the whole reply
///
/// An empty result means the model said nothing usable.
pub fn clean_reply(input: &str) -> String {
    strip_reasoning(input).trim().to_string()
}

// ── Rule 1: Drop reasoning blocks ────────────────────────────────────────────

static RE_THINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

fn strip_reasoning(input: &str) -> String {
    RE_THINK.replace_all(input, "").to_string()
}
