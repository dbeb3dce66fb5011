//! Typed terminal output commands and a single output gate.
//!
//! Invariant: all writes to the engine's sink flow through `OutputGate::flush(..)`.

use std::borrow::Cow;
use std::io::{self, Write};

use crate::core::terminal::{TerminalDriver, HIDE_CURSOR, SHOW_CURSOR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd<'a> {
    /// Content bytes (dynamic region or bypass payload), written verbatim.
    Bytes(Cow<'a, [u8]>),
    /// Clear the current line plus this many lines above it.
    EraseLines(usize),

    /// Cursor visibility.
    HideCursor,
    ShowCursor,
}

impl<'a> TerminalCmd<'a> {
    pub fn bytes(data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self::Bytes(data.into())
    }
}

/// Commands may borrow the render buffers, so a gate lives for one
/// operation (a paint, a bypass write, a teardown) and is flushed before the
/// buffers change again.
#[derive(Debug, Default)]
pub struct OutputGate<'a> {
    cmds: Vec<TerminalCmd<'a>>,
}

impl<'a> OutputGate<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd<'a>) {
        self.cmds.push(cmd);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Write buffered commands to `sink` in order, then flush it.
    ///
    /// Stops at the first failing command; the remaining commands are dropped
    /// so a later flush never replays a half-written frame.
    pub fn flush(&mut self, sink: &mut dyn Write, driver: &mut TerminalDriver) -> io::Result<()> {
        let mut result = Ok(());
        for cmd in self.cmds.drain(..) {
            let step = match cmd {
                TerminalCmd::Bytes(data) => {
                    if data.is_empty() {
                        Ok(())
                    } else {
                        sink.write_all(&data)
                    }
                }
                TerminalCmd::EraseLines(lines) => driver.erase(sink, lines),
                TerminalCmd::HideCursor => sink.write_all(HIDE_CURSOR),
                TerminalCmd::ShowCursor => sink.write_all(SHOW_CURSOR),
            };
            if let Err(err) = step {
                result = Err(err);
                break;
            }
        }
        self.cmds.clear();
        result?;
        sink.flush()
    }
}
