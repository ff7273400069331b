//! Text helpers.

/// Default length used when raw server text is placed in log records.
pub const DEFAULT_TRUNCATE_LEN: usize = 1000;

/// Shortens `s` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
