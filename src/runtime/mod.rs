//! Engine lifecycle, tick scheduling and the bypass channel.

pub mod bypass;
pub mod content;
pub mod engine;

pub use bypass::Bypass;
pub use content::ContentSource;
pub use engine::{Lifecycle, LiveTerm, TickOutcome};
