//! Welch power spectral density estimation
//!
//! The analyzer owns one forward FFT plan for its segment length.
//! [`SpectralAnalyzer::estimate_psd`] tapers the whole signal with a Hamming
//! window before the averaged periodogram; [`SpectralAnalyzer::welch`] skips
//! the taper.

use eeg_core::{EegError, EegResult, FrequencyBand};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::borrow::Cow;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// One-sided power spectral density on a uniform frequency grid
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PowerSpectrum {
    pub freqs: Vec<f64>,
    pub psd: Vec<f64>,
}

impl PowerSpectrum {
    /// Bins whose frequency lies in `[band.low_hz, band.high_hz]`
    pub fn band_slice(&self, band: &FrequencyBand) -> PowerSpectrum {
        let (freqs, psd) = self
            .freqs
            .iter()
            .zip(&self.psd)
            .filter(|(f, _)| band.contains(**f))
            .map(|(f, p)| (*f, *p))
            .unzip();
        PowerSpectrum { freqs, psd }
    }

    /// Trapezoidal integral of the PSD over frequency
    pub fn integrated_power(&self) -> f64 {
        trapezoid(&self.psd, &self.freqs)
    }

    /// Mean PSD value, 0 when empty
    pub fn mean(&self) -> f64 {
        if self.psd.is_empty() {
            0.0
        } else {
            self.psd.iter().sum::<f64>() / self.psd.len() as f64
        }
    }

    pub fn total(&self) -> f64 {
        self.psd.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.psd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psd.is_empty()
    }

    /// Frequency of the largest bin
    pub fn peak_frequency(&self) -> Option<f64> {
        self.psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.freqs[i])
    }
}

/// Trapezoidal rule over paired samples; 0 for fewer than two points
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yy, xx)| (xx[1] - xx[0]) * (yy[0] + yy[1]) / 2.0)
        .sum()
}

/// Symmetric Hamming window
pub fn hamming(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|k| 0.54 - 0.46 * (2.0 * PI * k as f64 / denom).cos())
        .collect()
}

/// Periodic Hann window (DFT-even)
pub fn hann_periodic(len: usize) -> Vec<f64> {
    let n = len as f64;
    (0..len)
        .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / n).cos())
        .collect()
}

/// Averaged-periodogram estimator with fixed segment parameters
pub struct SpectralAnalyzer {
    sampling_rate: f64,
    segment_len: usize,
    segment_overlap: usize,
    segment_window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("sampling_rate", &self.sampling_rate)
            .field("segment_len", &self.segment_len)
            .field("segment_overlap", &self.segment_overlap)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    pub fn new(sampling_rate: f64, segment_len: usize, segment_overlap: usize) -> EegResult<Self> {
        if segment_len < 2 || segment_overlap >= segment_len {
            return Err(EegError::config(format!(
                "PSD segment length {} must be at least 2 and exceed overlap {}",
                segment_len, segment_overlap
            )));
        }
        if !(sampling_rate > 0.0 && sampling_rate.is_finite()) {
            return Err(EegError::config(format!(
                "sampling rate {} Hz must be positive",
                sampling_rate
            )));
        }

        let mut planner = FftPlanner::new();
        Ok(SpectralAnalyzer {
            sampling_rate,
            segment_len,
            segment_overlap,
            segment_window: hann_periodic(segment_len),
            fft: planner.plan_fft_forward(segment_len),
        })
    }

    /// Whole-signal Hamming taper
    pub fn taper(&self, signal: &[f64]) -> Vec<f64> {
        signal.iter().zip(hamming(signal.len())).map(|(x, w)| x * w).collect()
    }

    /// Hamming taper followed by the Welch estimate
    pub fn estimate_psd(&self, signal: &[f64]) -> EegResult<PowerSpectrum> {
        self.welch(&self.taper(signal))
    }

    /// Welch estimate with constant detrend and density scaling
    ///
    /// Signals shorter than one segment are analysed as a single segment of
    /// their own length.
    pub fn welch(&self, signal: &[f64]) -> EegResult<PowerSpectrum> {
        if signal.len() < 2 {
            return Err(EegError::SignalTooShort {
                required: 2,
                actual: signal.len(),
            });
        }

        let (nperseg, noverlap) = if signal.len() < self.segment_len {
            (signal.len(), signal.len() / 2)
        } else {
            (self.segment_len, self.segment_overlap)
        };

        let (fft, window): (Arc<dyn Fft<f64>>, Cow<'_, [f64]>) = if nperseg == self.segment_len {
            (Arc::clone(&self.fft), Cow::Borrowed(&self.segment_window))
        } else {
            (
                FftPlanner::new().plan_fft_forward(nperseg),
                Cow::Owned(hann_periodic(nperseg)),
            )
        };

        let step = nperseg - noverlap;
        let segments = (signal.len() - noverlap) / step;
        let scale = 1.0 / (self.sampling_rate * window.iter().map(|w| w * w).sum::<f64>());
        let bins = nperseg / 2 + 1;

        let mut psd = vec![0.0; bins];
        let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];
        for s in 0..segments {
            let segment = &signal[s * step..s * step + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;
            for (slot, (x, w)) in buffer.iter_mut().zip(segment.iter().zip(window.iter())) {
                *slot = Complex::new((x - mean) * w, 0.0);
            }
            fft.process(&mut buffer);
            for (acc, value) in psd.iter_mut().zip(&buffer) {
                *acc += value.norm_sqr() * scale;
            }
        }

        // Fold negative frequencies; DC and an even-length Nyquist bin are unique
        let doubled_end = if nperseg % 2 == 0 { bins - 1 } else { bins };
        for value in &mut psd[1..doubled_end] {
            *value *= 2.0;
        }
        for value in &mut psd {
            *value /= segments as f64;
        }

        let resolution = self.sampling_rate / nperseg as f64;
        let freqs = (0..bins).map(|k| k as f64 * resolution).collect();

        Ok(PowerSpectrum { freqs, psd })
    }

    /// Integrated power of `spectrum` within `band`
    pub fn band_power(&self, spectrum: &PowerSpectrum, band: &FrequencyBand) -> f64 {
        spectrum.band_slice(band).integrated_power()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }
}
