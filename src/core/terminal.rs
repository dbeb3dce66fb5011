//! Erase backends for the dynamic region.
//!
//! The engine never branches on the platform: it asks the [`TerminalDriver`]
//! picked at start time to erase `n` lines and the driver realises it either
//! with ANSI sequences or through a native console buffer binding.

use std::fmt;
use std::io::{self, Write};

/// Cursor to column 0, then clear the whole line.
pub const CLEAR_CURRENT_LINE: &[u8] = b"\x1b[0G\x1b[2K";
/// Cursor up one line, then clear the whole line.
pub const CLEAR_PREVIOUS_LINE: &[u8] = b"\x1b[1A\x1b[2K";
pub const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
pub const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

/// Native console screen buffer access, for outputs that do not interpret
/// ANSI sequences (legacy consoles with redirected handles).
///
/// Rows and columns are screen buffer coordinates.
pub trait ConsoleBuffer: Send {
    /// Current cursor position as `(column, row)`.
    fn cursor_position(&mut self) -> io::Result<(i32, i32)>;

    fn set_cursor_position(&mut self, column: i32, row: i32) -> io::Result<()>;

    /// Blank the whole `row` without moving the cursor.
    fn clear_row(&mut self, row: i32) -> io::Result<()>;
}

pub enum TerminalDriver {
    Ansi,
    Console(Box<dyn ConsoleBuffer>),
}

impl fmt::Debug for TerminalDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TerminalDriver {
    /// Pick the erase backend for an output.
    ///
    /// A real terminal always gets ANSI sequences. A redirected output falls
    /// back to the console binding when one is available; without one we
    /// still emit ANSI and hope the consumer understands it.
    pub fn detect(output_is_terminal: bool, console: Option<Box<dyn ConsoleBuffer>>) -> Self {
        match console {
            Some(console) if !output_is_terminal => TerminalDriver::Console(console),
            _ => TerminalDriver::Ansi,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TerminalDriver::Ansi => "ansi",
            TerminalDriver::Console(_) => "console",
        }
    }

    /// Erase the partially written current line, then `lines` lines above it.
    ///
    /// The current line is always cleared first: raw content may end without
    /// a newline and would otherwise leave stray characters behind.
    pub fn erase(&mut self, sink: &mut dyn Write, lines: usize) -> io::Result<()> {
        match self {
            TerminalDriver::Ansi => {
                let capacity = CLEAR_CURRENT_LINE.len() + lines * CLEAR_PREVIOUS_LINE.len();
                let mut seq = Vec::with_capacity(capacity);
                seq.extend_from_slice(CLEAR_CURRENT_LINE);
                for _ in 0..lines {
                    seq.extend_from_slice(CLEAR_PREVIOUS_LINE);
                }
                sink.write_all(&seq)
            }
            TerminalDriver::Console(console) => {
                // Pending bytes must land before the cursor is moved natively.
                sink.flush()?;
                let (_, mut row) = console.cursor_position()?;
                console.set_cursor_position(0, row)?;
                console.clear_row(row)?;
                for _ in 0..lines {
                    row -= 1;
                    console.set_cursor_position(0, row)?;
                    console.clear_row(row)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsoleBuffer, TerminalDriver, CLEAR_CURRENT_LINE, CLEAR_PREVIOUS_LINE};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ConsoleLog {
        cursor: (i32, i32),
        cleared: Vec<i32>,
    }

    struct FakeConsole(Arc<Mutex<ConsoleLog>>);

    impl ConsoleBuffer for FakeConsole {
        fn cursor_position(&mut self) -> io::Result<(i32, i32)> {
            Ok(self.0.lock().unwrap().cursor)
        }

        fn set_cursor_position(&mut self, column: i32, row: i32) -> io::Result<()> {
            self.0.lock().unwrap().cursor = (column, row);
            Ok(())
        }

        fn clear_row(&mut self, row: i32) -> io::Result<()> {
            self.0.lock().unwrap().cleared.push(row);
            Ok(())
        }
    }

    #[test]
    fn ansi_erase_clears_current_line_then_each_previous_line() {
        let mut driver = TerminalDriver::Ansi;
        let mut out = Vec::new();
        driver.erase(&mut out, 2).unwrap();

        let mut expected = CLEAR_CURRENT_LINE.to_vec();
        expected.extend_from_slice(CLEAR_PREVIOUS_LINE);
        expected.extend_from_slice(CLEAR_PREVIOUS_LINE);
        assert_eq!(out, expected);
    }

    #[test]
    fn ansi_erase_of_zero_lines_still_clears_current_line() {
        let mut driver = TerminalDriver::Ansi;
        let mut out = Vec::new();
        driver.erase(&mut out, 0).unwrap();
        assert_eq!(out, CLEAR_CURRENT_LINE);
    }

    #[test]
    fn console_erase_walks_rows_upward() {
        let log = Arc::new(Mutex::new(ConsoleLog {
            cursor: (7, 10),
            cleared: Vec::new(),
        }));
        let mut driver = TerminalDriver::Console(Box::new(FakeConsole(Arc::clone(&log))));
        let mut out = Vec::new();
        driver.erase(&mut out, 3).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.cleared, vec![10, 9, 8, 7]);
        assert_eq!(log.cursor, (0, 7));
        assert!(out.is_empty());
    }

    #[test]
    fn detection_prefers_ansi_for_terminals() {
        let console = || -> Box<dyn ConsoleBuffer> {
            Box::new(FakeConsole(Arc::new(Mutex::new(ConsoleLog::default()))))
        };
        assert_eq!(TerminalDriver::detect(true, Some(console())).name(), "ansi");
        assert_eq!(TerminalDriver::detect(false, None).name(), "ansi");
        assert_eq!(TerminalDriver::detect(false, Some(console())).name(), "console");
    }
}
