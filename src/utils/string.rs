//! String utilities
//!
//! Character-boundary-safe truncation and whitespace cleanup for page text
//! and log fields. Thai text is multi-byte, so byte slicing is never safe.

/// Truncate to at most `max_chars` characters
///
/// # Example
/// ```
/// use creator_hub::utils::truncate_str;
///
/// assert_eq!(truncate_str("สวัสดีครับ", 3), "สวั");
/// assert_eq!(truncate_str("hello", 100), "hello");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate and append `suffix` when something was cut
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}{}", truncate_str(s, max_chars), suffix)
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_ascii() {
        assert_eq!(truncate_str("Hello, World!", 5), "Hello");
        assert_eq!(truncate_str("Hello, World!", 100), "Hello, World!");
    }

    #[test]
    fn test_truncate_str_thai() {
        let text = "วิเคราะห์สินค้า";
        let cut = truncate_str(text, 4);
        assert_eq!(cut.chars().count(), 4);
        assert!(text.starts_with(cut));
    }

    #[test]
    fn test_truncate_with_suffix() {
        assert_eq!(truncate_with_suffix("Hello, World!", 5, "..."), "Hello...");
        assert_eq!(truncate_with_suffix("Hi", 5, "..."), "Hi");
    }

    #[test]
    fn test_truncate_empty() {
        assert_eq!(truncate_str("", 10), "");
        assert_eq!(truncate_with_suffix("", 10, "..."), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
