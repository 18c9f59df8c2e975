use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Truncates a string to at most `max_width` terminal columns, appending
/// "..." when anything was cut.
///
/// Width is measured with `unicode-width`, so CJK characters and emoji count
/// as two columns. Widths too narrow for a character plus the ellipsis return
/// only the characters that fit.
///
/// ```
/// use podmerge::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width <= ELLIPSIS_WIDTH {
        (max_width, "")
    } else {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], suffix))
}

/// Single-line, control-free label for an episode title in console output.
///
/// Newlines and tabs become spaces, runs of whitespace collapse, and other
/// control characters (including ESC, which starts ANSI sequences) are dropped
/// before truncating to `max_width` columns.
pub fn episode_label(title: &str, max_width: usize) -> String {
    let mut clean = String::with_capacity(title.len());
    for word in title.split_whitespace() {
        if !clean.is_empty() {
            clean.push(' ');
        }
        clean.extend(word.chars().filter(|c| !c.is_control()));
    }
    truncate_to_width(&clean, max_width).into_owned()
}
