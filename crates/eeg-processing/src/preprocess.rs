//! Artifact suppression for raw windows

use crate::filters::{moving_median, SosFilter};
use eeg_core::EegResult;

/// Median smoothing, mains notch and amplitude gate
#[derive(Debug, Clone)]
pub struct Preprocessor {
    kernel_size: usize,
    notch: SosFilter,
    artifact_threshold: f64,
}

impl Preprocessor {
    pub fn new(
        kernel_size: usize,
        notch_freq: f64,
        notch_q: f64,
        artifact_threshold: f64,
        sampling_rate: f64,
    ) -> EegResult<Self> {
        Ok(Preprocessor {
            kernel_size,
            notch: SosFilter::notch(notch_freq, notch_q, sampling_rate)?,
            artifact_threshold,
        })
    }

    /// Median filter with edge-clipped neighbourhoods
    pub fn smooth(&self, window: &[f64]) -> Vec<f64> {
        moving_median(window, self.kernel_size)
    }

    /// Zero-phase notch at the mains frequency
    pub fn reject_line_noise(&self, window: &[f64]) -> EegResult<Vec<f64>> {
        self.notch.filtfilt(window)
    }

    /// Any sample whose magnitude exceeds the threshold
    pub fn is_artifact(&self, window: &[f64]) -> bool {
        window.iter().any(|v| v.abs() > self.artifact_threshold)
    }

    /// Smoothing followed by notch filtering
    pub fn clean(&self, window: &[f64]) -> EegResult<Vec<f64>> {
        let smoothed = self.smooth(window);
        self.reject_line_noise(&smoothed)
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn artifact_threshold(&self) -> f64 {
        self.artifact_threshold
    }

    pub fn notch(&self) -> &SosFilter {
        &self.notch
    }
}
