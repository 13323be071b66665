//! Processing configuration fixed at startup

use crate::filters::SosFilter;
use eeg_core::{config_error, EegError, EegResult, FrequencyBand};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every tunable parameter of the feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Samples per window
    pub window_size: usize,
    /// Fraction of each window carried into the next
    pub overlap: f64,
    /// Band table in feature order
    pub bands: Vec<FrequencyBand>,
    /// Absolute amplitude above which a cleaned window is discarded
    pub artifact_threshold: f64,
    /// Median smoothing neighbourhood
    pub median_kernel: usize,
    /// Mains frequency to notch out (Hz)
    pub notch_freq: f64,
    pub notch_q: f64,
    /// Butterworth prototype order for band isolation
    pub bandpass_order: usize,
    pub psd_segment_len: usize,
    pub psd_segment_overlap: usize,
    pub permutation_order: usize,
    pub permutation_delay: usize,
    /// Placeholder class label written with every row
    pub label: i32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::standard_60hz()
    }
}

impl ProcessingConfig {
    /// 256 Hz headset on 60 Hz mains
    pub fn standard_60hz() -> Self {
        ProcessingConfig {
            sampling_rate: 256.0,
            window_size: 512,
            overlap: 0.5,
            bands: FrequencyBand::eeg_bands(),
            artifact_threshold: 150.0,
            median_kernel: 5,
            notch_freq: 60.0,
            notch_q: 30.0,
            bandpass_order: 8,
            psd_segment_len: 256,
            psd_segment_overlap: 128,
            permutation_order: 3,
            permutation_delay: 1,
            label: 0,
        }
    }

    /// Same as `standard_60hz` with the notch at 50 Hz
    pub fn standard_50hz() -> Self {
        ProcessingConfig {
            notch_freq: 50.0,
            ..Self::standard_60hz()
        }
    }

    pub fn nyquist(&self) -> f64 {
        self.sampling_rate / 2.0
    }

    /// Samples kept in the buffer after each window
    pub fn retained_samples(&self) -> usize {
        (self.window_size as f64 * self.overlap).round() as usize
    }

    /// New samples between consecutive windows
    pub fn window_step(&self) -> usize {
        self.window_size - self.retained_samples()
    }

    /// Check every startup constraint, including filter designs
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate.is_finite()) {
            return Err(config_error!("sampling rate must be positive, got {}", self.sampling_rate));
        }
        if self.window_size == 0 {
            return Err(config_error!("window size must be greater than 0"));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(config_error!("overlap must be in [0, 1), got {}", self.overlap));
        }
        if self.bands.is_empty() {
            return Err(config_error!("band table is empty"));
        }

        let nyquist = self.nyquist();
        let mut names = HashSet::new();
        for band in &self.bands {
            if band.name.trim().is_empty() {
                return Err(config_error!("band names must not be empty"));
            }
            if !names.insert(band.name.to_ascii_lowercase()) {
                return Err(config_error!("duplicate band '{}'", band.name));
            }
            band.check_edges(nyquist).map_err(EegError::config)?;
        }

        if !(self.artifact_threshold > 0.0) {
            return Err(config_error!(
                "artifact threshold must be positive, got {}",
                self.artifact_threshold
            ));
        }
        if self.median_kernel == 0 || self.median_kernel % 2 == 0 {
            return Err(config_error!("median kernel must be odd, got {}", self.median_kernel));
        }
        if !(self.notch_freq > 0.0 && self.notch_freq < nyquist) {
            return Err(config_error!(
                "notch frequency {} Hz must lie in (0, {}) Hz",
                self.notch_freq,
                nyquist
            ));
        }
        if !(self.notch_q > 0.0) {
            return Err(config_error!("notch quality factor must be positive"));
        }
        if self.bandpass_order == 0 {
            return Err(config_error!("bandpass order must be at least 1"));
        }
        if self.psd_segment_len < 2 || self.psd_segment_len > self.window_size {
            return Err(config_error!(
                "PSD segment length {} must be in 2..={}",
                self.psd_segment_len,
                self.window_size
            ));
        }
        if self.psd_segment_overlap >= self.psd_segment_len {
            return Err(config_error!(
                "PSD segment overlap {} must be below segment length {}",
                self.psd_segment_overlap,
                self.psd_segment_len
            ));
        }
        if !(2..=8).contains(&self.permutation_order) {
            return Err(config_error!(
                "permutation order must be in 2..=8, got {}",
                self.permutation_order
            ));
        }
        if self.permutation_delay == 0 {
            return Err(config_error!("permutation delay must be at least 1"));
        }

        self.validate_filters()
    }

    /// Design every filter once and check the window covers its padding
    fn validate_filters(&self) -> EegResult<()> {
        let notch = SosFilter::notch(self.notch_freq, self.notch_q, self.sampling_rate)?;
        let mut required = notch.min_input_len();

        for band in &self.bands {
            let filter = SosFilter::butterworth_bandpass(
                &band.name,
                self.bandpass_order,
                band.low_hz,
                band.high_hz,
                self.sampling_rate,
            )?;
            required = required.max(filter.min_input_len());
        }

        if self.window_size < required {
            return Err(config_error!(
                "window of {} samples is shorter than the {} required by zero-phase filtering",
                self.window_size,
                required
            ));
        }
        Ok(())
    }

    /// Export configuration as JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))
    }
}
