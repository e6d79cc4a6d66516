//! UTF-8-safe string helpers used when logging prompts and tool inputs.

/// Largest byte index <= `i` that falls on a char boundary of `s`.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Truncate `s` to at most `max_bytes`, never splitting a codepoint.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        s
    } else {
        &s[..floor_char_boundary(s, max_bytes)]
    }
}

/// Single-line preview of `s` for log fields: newlines collapsed, `...` appended when cut.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let cut = truncate_str(s, max_bytes);
    let mut out = cut.replace(['\n', '\r'], " ");
    if cut.len() < s.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_str_zero_max() {
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_str_emoji() {
        let s = "\u{1F600}\u{1F601}";
        assert_eq!(truncate_str(s, 5), "\u{1F600}");
    }

    #[test]
    fn test_preview_collapses_newlines() {
        assert_eq!(preview("ls -la\ncat x", 100), "ls -la cat x");
    }

    #[test]
    fn test_preview_marks_truncation() {
        assert_eq!(preview("list all files", 4), "list...");
        assert_eq!(preview("caf\u{00e9}", 4), "caf...");
    }

    #[test]
    fn test_preview_untouched_when_short() {
        assert_eq!(preview("ok", 4), "ok");
    }
}
