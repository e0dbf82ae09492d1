//! Small text helpers shared by the observer, the decision payload and the
//! environment adapters.

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Case-insensitive membership test of any needle in `haystack_lower`.
///
/// `haystack_lower` must already be lower-cased; needles are compared as given.
pub fn contains_any(haystack_lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack_lower.contains(n))
}
