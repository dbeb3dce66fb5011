//! Permanent output that scrolls above the dynamic region.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{LiveError, Result};
use crate::runtime::engine::{DelayedStep, Shared};

/// Bytes accepted during a resize window, waiting for it to close.
///
/// A failed flush puts them back here for the next attempt.
pub(crate) struct PendingBypass {
    pub(crate) bytes: Vec<u8>,
    /// Taken by teardown so it can wait for the final flush.
    pub(crate) helper: Option<JoinHandle<()>>,
    /// Flush now, regardless of the window.
    pub(crate) cancelled: bool,
}

impl PendingBypass {
    fn new(bytes: Vec<u8>, helper: JoinHandle<()>) -> Self {
        Self {
            bytes,
            helper: Some(helper),
            cancelled: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            helper: None,
            cancelled: false,
        }
    }
}

/// Writer for permanent lines while the engine runs.
///
/// Each write erases the dynamic region, writes the bytes, and repaints the
/// last dynamic content below them, so permanent output is never overwritten.
/// While a resize is stabilizing, writes are accepted immediately and held
/// back until the window closes (or the engine stops).
///
/// One `write` (or one `write!`) is one unit: put a whole line in it, and
/// end it with `\n`. Without the newline the repaint continues on the same
/// line and the next erase wipes the permanent text along with it.
/// Writes fail with [`LiveError::NotStarted`] (wrapped in an
/// [`io::Error`] of kind `NotConnected`) when the engine is not running.
/// Must not be used from inside a content producer.
#[derive(Clone)]
pub struct Bypass {
    shared: Arc<Shared>,
}

impl fmt::Debug for Bypass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bypass").finish_non_exhaustive()
    }
}

impl Bypass {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Same as [`Write::write`], with the engine's error type.
    pub fn write_permanent(&self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.shared.lock_state();
        if !state.is_running() {
            return Err(LiveError::NotStarted);
        }
        let Some(run) = state.run.as_mut() else {
            return Err(LiveError::NotStarted);
        };
        if bytes.is_empty() {
            return Ok(0);
        }

        if run.in_resize_window(Instant::now()) {
            match run.pending.as_mut() {
                Some(pending) => pending.bytes.extend_from_slice(bytes),
                None => {
                    let shared = Arc::clone(&self.shared);
                    // Blocks on the state lock until this write returns.
                    let helper = thread::Builder::new()
                        .name("liveterm-bypass".to_string())
                        .spawn(move || delayed_flush(shared))?;
                    run.pending = Some(PendingBypass::new(bytes.to_vec(), helper));
                    tracing::debug!(bytes = bytes.len(), "bypass held back until resize settles");
                }
            }
            return Ok(bytes.len());
        }

        run.write_through(bytes)?;
        Ok(bytes.len())
    }
}

impl Write for Bypass {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_permanent(buf).map_err(io::Error::from)
    }

    /// Formats the whole message first so `write!` lands as one write.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.write_all(args.to_string().as_bytes())
    }

    /// Every accepted write is already flushed or scheduled.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for &Bypass {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_permanent(buf).map_err(io::Error::from)
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.write_all(args.to_string().as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn delayed_flush(shared: Arc<Shared>) {
    let mut state = shared.lock_state();
    loop {
        let step = match state.run.as_mut() {
            Some(run) => run.delayed_step(Instant::now()),
            None => return,
        };
        match step {
            DelayedStep::Wait(timeout) => state = shared.wait_timeout(state, timeout),
            DelayedStep::Done(result) => {
                drop(state);
                if let Err(err) = result {
                    shared.report(err.into());
                }
                return;
            }
        }
    }
}
