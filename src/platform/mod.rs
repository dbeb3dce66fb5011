//! Platform-specific terminal integrations.

pub mod size;

pub use size::{ManualSize, ResizeWatcher, SizeOracle, SizePolicy, TerminalSize, TtySize};
