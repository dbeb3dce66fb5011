//! Terminal-facing primitives: the output gate, erase drivers and text measurement.

pub mod output;
pub mod terminal;
pub mod text;
