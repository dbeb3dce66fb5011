//! Buffer pair and wrap-aware footprint measurement.

pub mod buffer;
pub mod eraser;

pub use buffer::RenderBuffers;
pub use eraser::{lines_occupied, measure, Footprint};
