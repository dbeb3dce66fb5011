//! Live-updating inline terminal region.
//!
//! A [`LiveTerm`] repaints a block of dynamic text (a status line, a counter,
//! a small dashboard) in place at a fixed interval. Permanent lines written
//! through its [`Bypass`] scroll above the dynamic region without ever being
//! overwritten by it.
//!
//! Invariant: single output gate. Only `core::output::OutputGate::flush(..)` writes to the
//! engine's sink, and every flush happens under the engine lock.
//!
//! # Public API Overview
//! - Build a [`LiveTerm`] from a [`LiveConfig`] (or [`LiveConfig::from_env`]).
//! - Install a [`ContentSource`] and call [`LiveTerm::start`].
//! - Emit permanent output through [`LiveTerm::bypass`].
//! - Call [`LiveTerm::stop`] to leave the last frame on screen or erase it.
//! - Use [`lines_occupied`] to measure how many rows a buffer covers.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Write;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use liveterm::{LiveConfig, LiveTerm};
//!
//! fn main() -> liveterm::Result<()> {
//!     let term = LiveTerm::new(LiveConfig::default());
//!     let counter = Arc::new(AtomicU64::new(0));
//!
//!     let shown = Arc::clone(&counter);
//!     term.set_line_fn(move || format!("counter: {}", shown.load(Ordering::Relaxed)));
//!     term.start()?;
//!
//!     let mut bypass = term.bypass();
//!     for i in 0..300u64 {
//!         if i == 150 {
//!             writeln!(bypass, "halfway there")?;
//!         }
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         thread::sleep(Duration::from_millis(10));
//!     }
//!
//!     term.stop(false)
//! }
//! ```

#![allow(
    clippy::derivable_impls,
    clippy::question_mark,
    clippy::type_complexity,
    clippy::unnecessary_map_or
)]

pub mod config;
pub mod error;
pub mod logging;

pub mod core;
pub mod platform;
pub mod render;
pub mod runtime;

/// Engine entry points.
pub use crate::runtime::{Bypass, ContentSource, Lifecycle, LiveTerm, TickOutcome};

/// Configuration and environment overrides.
pub use crate::config::{
    EnvConfig, ErrorHandler, LiveConfig, OutputTarget, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_STABILIZATION_DELAY,
};

/// Errors.
pub use crate::error::{LiveError, Result};

/// Terminal size sources.
pub use crate::platform::size::{
    ManualSize, ResizeWatcher, SizeOracle, SizePolicy, TerminalSize, TtySize,
};

/// Erase backends.
pub use crate::core::terminal::{ConsoleBuffer, TerminalDriver};

/// Wrap-aware measurement and the buffer pair.
pub use crate::render::{lines_occupied, measure, Footprint, RenderBuffers};

/// Display width helpers.
pub use crate::core::text::{ansi_sequence_len, char_width};

/// Opt-in file logging.
pub use crate::logging::{init_tracing, init_tracing_to_file};
