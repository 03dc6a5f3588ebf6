//! Job progress tracking.
//!
//! The [`ProgressLog`] is the source of truth for whether the cache warmer
//! has unfinished work and where to resume it.

pub mod log;

pub use log::{ProgressLog, ProgressLogError};
