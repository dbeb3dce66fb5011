//! Terminal size oracle.
//!
//! Two refresh policies are supported: poll the controlling terminal on every
//! query ([`TtySize`]) or cache the size and refresh it on `SIGWINCH`
//! ([`ResizeWatcher`]). The engine only ever consumes "the last known size".

use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[cfg(unix)]
use libc::{self, c_int};
#[cfg(unix)]
use signal_hook::iterator::Signals;
#[cfg(unix)]
use std::fs::OpenOptions;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use std::thread;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TerminalSize {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalSize {
    /// Size of something that is not a controllable terminal.
    pub const UNKNOWN: TerminalSize = TerminalSize {
        columns: 0,
        rows: 0,
    };

    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }

    /// A zero column count disables wrap-aware line counting.
    pub fn is_known(&self) -> bool {
        self.columns != 0
    }
}

/// Source of the current terminal size. Fails soft to [`TerminalSize::UNKNOWN`].
pub trait SizeOracle: Send + Sync {
    fn query(&self) -> TerminalSize;
}

/// How the engine refreshes the terminal size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizePolicy {
    /// Query the terminal at the top of every tick.
    #[default]
    Poll,
    /// Keep a cached size refreshed by `SIGWINCH` (polling where unsupported).
    Signal,
}

fn lock_size(size: &Mutex<TerminalSize>) -> TerminalSize {
    match size.lock() {
        Ok(size) => *size,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Size oracle backed by a value the owner sets explicitly.
///
/// Useful when the caller already tracks resizes, and in tests.
#[derive(Debug, Clone, Default)]
pub struct ManualSize {
    size: Arc<Mutex<TerminalSize>>,
}

impl ManualSize {
    pub fn new(size: TerminalSize) -> Self {
        Self {
            size: Arc::new(Mutex::new(size)),
        }
    }

    pub fn set(&self, size: TerminalSize) {
        let mut current = self
            .size
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = size;
    }
}

impl SizeOracle for ManualSize {
    fn query(&self) -> TerminalSize {
        lock_size(&self.size)
    }
}

#[cfg(unix)]
fn read_winsize(fd: c_int) -> Option<TerminalSize> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some(TerminalSize::new(size.ws_col, size.ws_row))
    } else {
        None
    }
}

/// Polls the controlling terminal (`/dev/tty`) for its window size.
#[derive(Debug)]
pub struct TtySize {
    tty: File,
}

impl TtySize {
    /// Open the controlling terminal.
    ///
    /// Fails when the process has no controlling terminal; callers then run
    /// with an unknown size.
    #[cfg(unix)]
    pub fn open() -> io::Result<Self> {
        // OpenBSD refuses TIOCGWINSZ on a write-only descriptor.
        let tty = if cfg!(target_os = "openbsd") {
            OpenOptions::new().read(true).write(true).open("/dev/tty")?
        } else {
            OpenOptions::new().write(true).open("/dev/tty")?
        };
        Ok(Self { tty })
    }

    #[cfg(not(unix))]
    pub fn open() -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "terminal size queries are only supported on Unix platforms",
        ))
    }
}

impl SizeOracle for TtySize {
    #[cfg(unix)]
    fn query(&self) -> TerminalSize {
        read_winsize(self.tty.as_raw_fd()).unwrap_or(TerminalSize::UNKNOWN)
    }

    #[cfg(not(unix))]
    fn query(&self) -> TerminalSize {
        let _ = &self.tty;
        TerminalSize::UNKNOWN
    }
}

/// Cached size refreshed from a background thread on every `SIGWINCH`.
pub struct ResizeWatcher {
    cache: Arc<Mutex<TerminalSize>>,
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    /// Seed the cache from `source` and refresh it on each resize signal.
    #[cfg(unix)]
    pub fn spawn(source: Arc<dyn SizeOracle>) -> io::Result<Self> {
        let cache = Arc::new(Mutex::new(source.query()));
        let mut signals = Signals::new([libc::SIGWINCH])?;
        let handle = signals.handle();
        let thread_cache = Arc::clone(&cache);

        let thread = thread::Builder::new()
            .name("liveterm-resize".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    let size = source.query();
                    tracing::trace!(columns = size.columns, rows = size.rows, "SIGWINCH");
                    let mut cached = thread_cache
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    *cached = size;
                }
            })?;

        Ok(Self {
            cache,
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(not(unix))]
    pub fn spawn(_source: Arc<dyn SizeOracle>) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "resize signals are only supported on Unix platforms",
        ))
    }
}

impl SizeOracle for ResizeWatcher {
    fn query(&self) -> TerminalSize {
        lock_size(&self.cache)
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
