//! Per-character terminal cell width.

use unicode_width::UnicodeWidthChar;

/// Number of terminal cells `ch` occupies once printed.
///
/// Control characters (and other non-printing chars) take no cell.
pub fn char_width(ch: char) -> usize {
    if ch.is_control() {
        return 0;
    }
    UnicodeWidthChar::width(ch).unwrap_or(0)
}
