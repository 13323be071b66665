//! EEG-Processing: Real-time feature extraction for single-channel EEG
//!
//! Sliding-window buffering, artifact suppression, zero-phase band isolation,
//! Welch spectra and entropy features, assembled by `FeaturePipeline`.

pub mod band_filter;
pub mod buffer;
pub mod config;
pub mod entropy;
pub mod filters;
pub mod pipeline;
pub mod preprocess;
pub mod spectral;

pub use band_filter::BandFilterBank;
pub use buffer::{SampleBuffer, Window};
pub use config::ProcessingConfig;
pub use entropy::{permutation_entropy, EntropyExtractor};
pub use filters::{moving_median, BiquadSection, SosFilter};
pub use pipeline::*;
pub use preprocess::Preprocessor;
pub use spectral::{hamming, trapezoid, PowerSpectrum, SpectralAnalyzer};
