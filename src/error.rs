//! Error taxonomy for the redraw engine.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    /// `start` (or a configuration setter) was called while the engine runs.
    #[error("liveterm is already started")]
    AlreadyRunning,

    /// The engine is not running: bypass writes, forced updates and `stop`
    /// are rejected.
    #[error("liveterm is not started, can not write to terminal")]
    NotStarted,

    /// Cursor control was requested on an output that is not a terminal.
    #[error("output is not a terminal")]
    NotATerminal,

    #[error("terminal write failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LiveError>;

impl From<LiveError> for io::Error {
    fn from(err: LiveError) -> Self {
        match err {
            LiveError::Io(err) => err,
            LiveError::NotStarted => {
                io::Error::new(io::ErrorKind::NotConnected, LiveError::NotStarted)
            }
            other => io::Error::other(other),
        }
    }
}

impl LiveError {
    /// Recover a [`LiveError`] that was carried through an [`io::Error`]
    /// (as returned by the [`crate::Bypass`] writer).
    pub fn from_io(err: &io::Error) -> Option<&LiveError> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<LiveError>())
    }
}
