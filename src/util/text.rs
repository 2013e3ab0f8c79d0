use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Flatten provider text into a single terminal-safe line.
///
/// Control characters (including ESC, so ANSI sequences lose their
/// introducer) are dropped and runs of whitespace collapse to one space.
/// Returns `Cow::Borrowed` when nothing needed changing.
pub fn sanitize_line(s: &str) -> Cow<'_, str> {
    let clean = !s.chars().any(char::is_control) && !s.contains("  ") && s.trim() == s;
    if clean {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    for word in s
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}

/// Truncate to at most `max_width` terminal columns, appending "..." when cut.
///
/// Widths too narrow for a character plus the ellipsis get a plain prefix.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width > ELLIPSIS.len() {
        max_width - ELLIPSIS.len()
    } else {
        max_width
    };

    let mut width = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        end = idx + c.len_utf8();
    }

    if max_width > ELLIPSIS.len() {
        Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
    } else {
        Cow::Owned(s[..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clean_is_borrowed() {
        assert!(matches!(sanitize_line("Plain title"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_sanitize_strips_controls_and_newlines() {
        assert_eq!(sanitize_line("Line one\n\nline\ttwo\x1b"), "Line one line two");
        assert_eq!(sanitize_line("  padded  "), "padded");
    }

    #[test]
    fn test_truncate_fits() {
        assert_eq!(truncate_to_width("Short", 10), "Short");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // each CJK char is two columns
        assert_eq!(truncate_to_width("你好世界", 7), "你好...");
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 2), "Te");
        assert_eq!(truncate_to_width("Test", 3), "Tes");
    }
}
