//! Display width helpers used by the wrap-aware line counter.

pub mod ansi;
pub mod width;

pub use ansi::{ansi_sequence_len, AnsiCodeKind};
pub use width::char_width;
