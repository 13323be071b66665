//! Per-band zero-phase bandpass isolation

use crate::filters::SosFilter;
use eeg_core::{EegError, EegResult, FrequencyBand};

/// Bandpass filters designed once per band at startup
#[derive(Debug, Clone)]
pub struct BandFilterBank {
    entries: Vec<(FrequencyBand, SosFilter)>,
}

impl BandFilterBank {
    pub fn new(bands: &[FrequencyBand], order: usize, sampling_rate: f64) -> EegResult<Self> {
        let entries = bands
            .iter()
            .map(|band| {
                SosFilter::butterworth_bandpass(&band.name, order, band.low_hz, band.high_hz, sampling_rate)
                    .map(|filter| (band.clone(), filter))
            })
            .collect::<EegResult<Vec<_>>>()?;

        Ok(BandFilterBank { entries })
    }

    /// Band-limited copy of `window`, same length as the input
    pub fn isolate_band(&self, window: &[f64], band: &FrequencyBand) -> EegResult<Vec<f64>> {
        let filter = self
            .entries
            .iter()
            .find(|(b, _)| b.name == band.name)
            .map(|(_, filter)| filter)
            .ok_or_else(|| EegError::config(format!("band '{}' is not in the filter bank", band.name)))?;
        filter.filtfilt(window)
    }

    /// Bands in feature order
    pub fn bands(&self) -> impl Iterator<Item = &FrequencyBand> {
        self.entries.iter().map(|(band, _)| band)
    }

    pub fn filters(&self) -> impl Iterator<Item = &SosFilter> {
        self.entries.iter().map(|(_, filter)| filter)
    }

    /// Longest zero-phase padding across all bands
    pub fn max_padding_len(&self) -> usize {
        self.filters().map(SosFilter::padding_len).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
