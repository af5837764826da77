//! Truncation Utilities
//!
//! Shortens model output for diagnostics and logs, keeping both ends of the
//! text and respecting UTF-8 boundaries.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Keep at most this many bytes, split between prefix and suffix
    Bytes(usize),
}

pub fn truncate_text(content: &str, policy: TruncationPolicy) -> String {
    match policy {
        TruncationPolicy::Bytes(max_bytes) => truncate_bytes(content, max_bytes),
    }
}

fn truncate_bytes(content: &str, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content.to_string();
    }
    if max_bytes == 0 {
        return format!("[{} bytes truncated]", content.len());
    }

    let half = max_bytes / 2;
    let prefix_end = floor_char_boundary(content, half);
    let suffix_start = ceil_char_boundary(content, content.len() - half).max(prefix_end);

    let prefix = &content[..prefix_end];
    let suffix = &content[suffix_start..];
    let dropped = content.len() - prefix.len() - suffix.len();

    format!("{} ... [{} bytes truncated] ... {}", prefix, dropped, suffix)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_text("hello", TruncationPolicy::Bytes(10)), "hello");
    }

    #[test]
    fn test_keeps_prefix_and_suffix() {
        let out = truncate_text("abcdefghijklmnopqrstuvwxyz", TruncationPolicy::Bytes(6));
        assert_eq!(out, "abc ... [20 bytes truncated] ... xyz");
    }

    #[test]
    fn test_respects_utf8() {
        let out = truncate_text("ééééééééé", TruncationPolicy::Bytes(5));
        assert!(out.starts_with("é "));
        assert!(out.ends_with(" é"));
    }
}
