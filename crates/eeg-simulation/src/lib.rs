//! EEG-Simulation: Synthetic single-channel EEG sources
//!
//! Deterministic sample generation for tests and demos, plus a paced stream
//! that stands in for a headset delivering one sample per callback.

pub mod eeg_simulator;
pub mod real_time_stream;
pub mod signal_patterns;

pub use eeg_simulator::*;
pub use real_time_stream::*;
pub use signal_patterns::*;
