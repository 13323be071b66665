//! EEG-Core: Foundation types for the emotion feature pipeline
//!
//! Leaf types shared by every crate: errors, frequency bands, the per-window
//! feature schema and window timestamps.

pub mod band;
pub mod error;
pub mod features;
pub mod timestamp;

pub use band::*;
pub use error::{EegError, EegResult};
pub use features::*;
pub use timestamp::WindowTimestamp;
