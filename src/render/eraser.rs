//! Wrap-aware line counting for the previously painted dynamic region.

use crate::core::output::TerminalCmd;
use crate::core::text::{ansi_sequence_len, char_width};

/// Screen footprint of a painted buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footprint {
    /// Line breaks (explicit newlines and soft wraps) the buffer produced,
    /// i.e. how far the cursor moved down while painting it.
    pub rows_above_cursor: usize,
    /// Cells used on the cursor's line after the last break.
    pub trailing_width: usize,
}

impl Footprint {
    /// Physical terminal lines touched, counting a non-empty last line
    /// that has no trailing newline (raw content).
    pub fn lines(&self) -> usize {
        self.rows_above_cursor + usize::from(self.trailing_width > 0)
    }

    /// Erase command for this footprint: the cursor line is always cleared,
    /// then one line per break above it.
    pub fn erase_cmd(&self) -> TerminalCmd<'static> {
        TerminalCmd::EraseLines(self.rows_above_cursor)
    }
}

/// Walk `buffer` as it would be printed on a terminal `columns` cells wide.
///
/// `columns == 0` means the width is unknown: only explicit newlines are
/// counted. Escape sequences take no cells; invalid UTF-8 is decoded lossily
/// (one replacement char per bad sequence).
pub fn measure(buffer: &[u8], columns: u16) -> Footprint {
    let text = String::from_utf8_lossy(buffer);
    let bytes = text.as_bytes();
    let wrap_at = usize::from(columns);

    let mut footprint = Footprint::default();
    // Chars inside a skipped escape sequence end before this byte offset.
    let mut skip_until = 0;
    for (idx, ch) in text.char_indices() {
        if idx < skip_until {
            continue;
        }
        if let Some(len) = ansi_sequence_len(bytes, idx) {
            skip_until = idx + len;
            continue;
        }

        if ch == '\n' {
            footprint.rows_above_cursor += 1;
            footprint.trailing_width = 0;
            continue;
        }
        if wrap_at == 0 {
            continue;
        }
        let width = char_width(ch);
        footprint.trailing_width += width;
        if footprint.trailing_width > wrap_at {
            footprint.rows_above_cursor += 1;
            footprint.trailing_width = width;
        }
    }
    footprint
}

/// Number of physical terminal lines `buffer` occupies at `columns` width.
pub fn lines_occupied(buffer: &[u8], columns: u16) -> usize {
    measure(buffer, columns).lines()
}
