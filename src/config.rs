//! Engine configuration and environment overrides.

use std::env;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::terminal::ConsoleBuffer;
use crate::error::LiveError;
use crate::platform::size::{SizeOracle, SizePolicy};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_STABILIZATION_DELAY: Duration = Duration::from_millis(500);

/// Callback for errors no caller is waiting on (periodic ticks, delayed
/// bypass flushes). Runs on the engine's threads with no lock held.
pub type ErrorHandler = Box<dyn FnMut(&LiveError) + Send>;

/// Where the dynamic region is painted.
pub enum OutputTarget {
    Stdout,
    Stderr,
    /// Any byte sink. Handed to the engine on `start` and given back on `stop`.
    Writer(Box<dyn Write + Send>),
}

impl Default for OutputTarget {
    fn default() -> Self {
        OutputTarget::Stdout
    }
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("Stdout"),
            OutputTarget::Stderr => f.write_str("Stderr"),
            OutputTarget::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl OutputTarget {
    /// Whether this output is attached to a terminal. Custom writers cannot
    /// be inspected and report `false`.
    pub fn is_terminal(&self) -> bool {
        match self {
            OutputTarget::Stdout => io::stdout().is_terminal(),
            OutputTarget::Stderr => io::stderr().is_terminal(),
            OutputTarget::Writer(_) => false,
        }
    }

    /// Process streams need a terminal for cursor control; custom writers
    /// are trusted.
    pub(crate) fn is_process_stream(&self) -> bool {
        matches!(self, OutputTarget::Stdout | OutputTarget::Stderr)
    }
}

/// Settings captured by `start`. Every field must be set while the engine is
/// stopped; the engine's setters reject changes while it runs.
pub struct LiveConfig {
    pub refresh_interval: Duration,
    pub stabilization_delay: Duration,
    pub output: OutputTarget,
    pub hide_cursor: bool,
    pub size_policy: SizePolicy,
    /// Replaces the controlling-terminal query when set.
    pub size_oracle: Option<Arc<dyn SizeOracle>>,
    /// Native console binding used when the output is redirected.
    pub console: Option<Box<dyn ConsoleBuffer>>,
    pub on_error: Option<ErrorHandler>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stabilization_delay: DEFAULT_STABILIZATION_DELAY,
            output: OutputTarget::default(),
            hide_cursor: false,
            size_policy: SizePolicy::default(),
            size_oracle: None,
            console: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConfig")
            .field("refresh_interval", &self.refresh_interval)
            .field("stabilization_delay", &self.stabilization_delay)
            .field("output", &self.output)
            .field("hide_cursor", &self.hide_cursor)
            .field("size_policy", &self.size_policy)
            .field("size_oracle", &self.size_oracle.is_some())
            .field("console", &self.console.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl LiveConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        EnvConfig::from_env().apply(&mut config);
        config
    }
}

/// Environment overrides (`LIVETERM_*`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub refresh_interval: Option<Duration>,
    pub stabilization_delay: Option<Duration>,
    pub use_stderr: bool,
    pub hide_cursor: bool,
    pub size_signal: bool,
    pub log_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            refresh_interval: env_millis("LIVETERM_REFRESH_MS"),
            stabilization_delay: env_millis("LIVETERM_STABILIZE_MS"),
            use_stderr: env_flag("LIVETERM_STDERR"),
            hide_cursor: env_flag("LIVETERM_HIDE_CURSOR"),
            size_signal: env_flag("LIVETERM_SIZE_SIGNAL"),
            log_path: env_string_opt("LIVETERM_LOG").map(PathBuf::from),
        }
    }

    /// Overlay the values that are set onto `config`.
    pub fn apply(&self, config: &mut LiveConfig) {
        if let Some(interval) = self.refresh_interval {
            config.refresh_interval = interval;
        }
        if let Some(delay) = self.stabilization_delay {
            config.stabilization_delay = delay;
        }
        if self.use_stderr {
            config.output = OutputTarget::Stderr;
        }
        if self.hide_cursor {
            config.hide_cursor = true;
        }
        if self.size_signal {
            config.size_policy = SizePolicy::Signal;
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_millis(key: &str) -> Option<Duration> {
    env_string_opt(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
