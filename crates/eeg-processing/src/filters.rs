//! Digital filters for EEG preprocessing and band isolation
//!
//! IIR filters are realised as cascaded second-order sections and applied
//! forward-and-backward (`filtfilt`) so band-limited signals stay aligned
//! with the raw window.

use eeg_core::{EegError, EegResult};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Imaginary parts below this are treated as real poles when pairing sections
const IMAG_TOLERANCE: f64 = 1e-12;

/// Single biquad section (2nd order)
///
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSection {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Build a section from a pair of zeros and a pair of poles
    fn from_roots(zeros: [Complex64; 2], poles: [Complex64; 2]) -> Self {
        BiquadSection {
            b0: 1.0,
            b1: -(zeros[0] + zeros[1]).re,
            b2: (zeros[0] * zeros[1]).re,
            a1: -(poles[0] + poles[1]).re,
            a2: (poles[0] * poles[1]).re,
        }
    }

    fn scale_numerator(&mut self, gain: f64) {
        self.b0 *= gain;
        self.b1 *= gain;
        self.b2 *= gain;
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Poles strictly inside the unit circle (Jury conditions for 2nd order)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Transposed direct form II state holding a unit step at steady state
    fn step_state(&self) -> [f64; 2] {
        let y = self.dc_gain();
        [y - self.b0, self.b2 - self.a2 * y]
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b0 + z_inv * self.b1 + z_inv2 * self.b2;
        let den = 1.0 + z_inv * self.a1 + z_inv2 * self.a2;
        num / den
    }
}

/// Cascade of biquad sections with zero-phase application
#[derive(Debug, Clone)]
pub struct SosFilter {
    name: String,
    sampling_rate: f64,
    sections: Vec<BiquadSection>,
}

impl SosFilter {
    /// Design a Butterworth bandpass of the given prototype order
    ///
    /// The analog low-pass prototype is shifted to a bandpass around the
    /// pre-warped edges and mapped with the bilinear transform, so the result
    /// has `2 * order` poles grouped into `order` sections.
    pub fn butterworth_bandpass(
        name: &str,
        order: usize,
        low_hz: f64,
        high_hz: f64,
        sampling_rate: f64,
    ) -> EegResult<Self> {
        let design_error = |reason: String| EegError::FilterDesignError {
            filter: name.to_string(),
            reason,
        };

        if order == 0 {
            return Err(design_error("order must be at least 1".to_string()));
        }
        let nyquist = sampling_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(design_error(format!(
                "edges {}-{} Hz must satisfy 0 < low < high < nyquist ({} Hz)",
                low_hz, high_hz, nyquist
            )));
        }

        // Bilinear design with the sampling rate normalised to 2
        let fs2 = 4.0;
        let warp = |freq: f64| fs2 * (PI * (freq / nyquist) / 2.0).tan();
        let (w_low, w_high) = (warp(low_hz), warp(high_hz));
        let bandwidth = w_high - w_low;
        let center = (w_low * w_high).sqrt();

        let n = order as f64;
        let mut analog_poles = Vec::with_capacity(2 * order);
        for k in 0..order {
            let m = -n + 1.0 + 2.0 * k as f64;
            let prototype = -Complex64::from_polar(1.0, PI * m / (2.0 * n));
            let shifted = prototype * (bandwidth / 2.0);
            let offset = (shifted * shifted - center * center).sqrt();
            analog_poles.push(shifted + offset);
            analog_poles.push(shifted - offset);
        }

        // `order` analog zeros sit at the origin
        let mut denominator = Complex64::new(1.0, 0.0);
        for pole in &analog_poles {
            denominator *= fs2 - *pole;
        }
        let gain = (Complex64::new((bandwidth * fs2).powi(order as i32), 0.0) / denominator).re;

        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|pole| (fs2 + *pole) / (fs2 - *pole))
            .collect();

        let mut complex_poles: Vec<Complex64> = digital_poles
            .iter()
            .filter(|p| p.im > IMAG_TOLERANCE)
            .copied()
            .collect();
        let mut real_poles: Vec<f64> = digital_poles
            .iter()
            .filter(|p| p.im.abs() <= IMAG_TOLERANCE)
            .map(|p| p.re)
            .collect();

        if real_poles.len() % 2 != 0 || complex_poles.len() + real_poles.len() / 2 != order {
            return Err(design_error("poles could not be paired into sections".to_string()));
        }

        // Sections nearest the unit circle run last
        complex_poles.sort_by(|a, b| a.norm().total_cmp(&b.norm()));
        real_poles.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

        let edge_zeros = [Complex64::new(1.0, 0.0), Complex64::new(-1.0, 0.0)];
        let mut sections: Vec<BiquadSection> = real_poles
            .chunks(2)
            .map(|pair| {
                BiquadSection::from_roots(
                    edge_zeros,
                    [Complex64::new(pair[0], 0.0), Complex64::new(pair[1], 0.0)],
                )
            })
            .collect();
        sections.extend(
            complex_poles
                .iter()
                .map(|pole| BiquadSection::from_roots(edge_zeros, [*pole, pole.conj()])),
        );

        if let Some(first) = sections.first_mut() {
            first.scale_numerator(gain);
        }

        let filter = SosFilter {
            name: name.to_string(),
            sampling_rate,
            sections,
        };
        filter.check_stability()?;
        Ok(filter)
    }

    /// Design a second-order notch at `freq_hz` with quality factor `quality`
    pub fn notch(freq_hz: f64, quality: f64, sampling_rate: f64) -> EegResult<Self> {
        let nyquist = sampling_rate / 2.0;
        if !(freq_hz > 0.0 && freq_hz < nyquist) {
            return Err(EegError::FilterDesignError {
                filter: "notch".to_string(),
                reason: format!("frequency {} Hz must lie in (0, {}) Hz", freq_hz, nyquist),
            });
        }
        if !(quality > 0.0 && quality.is_finite()) {
            return Err(EegError::FilterDesignError {
                filter: "notch".to_string(),
                reason: format!("quality factor {} must be positive", quality),
            });
        }

        let w0 = PI * freq_hz / nyquist;
        let bandwidth = w0 / quality;
        let beta = (bandwidth / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_w0 = w0.cos();

        let section = BiquadSection {
            b0: gain,
            b1: -2.0 * gain * cos_w0,
            b2: gain,
            a1: -2.0 * gain * cos_w0,
            a2: 2.0 * gain - 1.0,
        };

        let filter = SosFilter {
            name: "notch".to_string(),
            sampling_rate,
            sections: vec![section],
        };
        filter.check_stability()?;
        Ok(filter)
    }

    fn check_stability(&self) -> EegResult<()> {
        if let Some(index) = self.sections.iter().position(|s| !s.is_stable()) {
            return Err(EegError::FilterDesignError {
                filter: self.name.clone(),
                reason: format!("section {} has poles on or outside the unit circle", index),
            });
        }
        if self.sections.iter().any(|s| {
            !(s.b0.is_finite() && s.b1.is_finite() && s.b2.is_finite())
        }) {
            return Err(EegError::FilterDesignError {
                filter: self.name.clone(),
                reason: "non-finite coefficients".to_string(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Number of edge samples added on each side by `filtfilt`
    pub fn padding_len(&self) -> usize {
        let trailing_b = self.sections.iter().filter(|s| s.b2 == 0.0).count();
        let trailing_a = self.sections.iter().filter(|s| s.a2 == 0.0).count();
        3 * (2 * self.sections.len() + 1 - trailing_b.min(trailing_a))
    }

    /// Shortest input `filtfilt` accepts
    pub fn min_input_len(&self) -> usize {
        self.padding_len() + 1
    }

    /// Magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sampling_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Causal filtering from rest
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        self.run(input, vec![[0.0; 2]; self.sections.len()])
    }

    /// Forward-backward filtering with odd-extension padding
    pub fn filtfilt(&self, input: &[f64]) -> EegResult<Vec<f64>> {
        let pad = self.padding_len();
        if input.len() <= pad {
            return Err(EegError::SignalTooShort {
                required: pad + 1,
                actual: input.len(),
            });
        }

        let extended = odd_extension(input, pad);
        let forward = self.run(&extended, self.initial_state(extended[0]));

        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.run(&reversed, self.initial_state(reversed[0]));

        Ok(backward.into_iter().rev().skip(pad).take(input.len()).collect())
    }

    /// Steady-state section states for a constant input of `level`
    fn initial_state(&self, level: f64) -> Vec<[f64; 2]> {
        let mut upstream_gain = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let step = section.step_state();
                let scale = upstream_gain * level;
                upstream_gain *= section.dc_gain();
                [step[0] * scale, step[1] * scale]
            })
            .collect()
    }

    fn run(&self, input: &[f64], mut state: Vec<[f64; 2]>) -> Vec<f64> {
        let mut output = Vec::with_capacity(input.len());
        for &x in input {
            let mut sample = x;
            for (section, z) in self.sections.iter().zip(state.iter_mut()) {
                let y = section.b0 * sample + z[0];
                z[0] = section.b1 * sample - section.a1 * y + z[1];
                z[1] = section.b2 * sample - section.a2 * y;
                sample = y;
            }
            output.push(sample);
        }
        output
    }
}

/// Point-symmetric extension of `pad` samples at both ends
fn odd_extension(input: &[f64], pad: usize) -> Vec<f64> {
    let n = input.len();
    let first = input[0];
    let last = input[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    extended.extend_from_slice(input);
    extended.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));
    extended
}

/// Running median over a centred neighbourhood of up to `kernel_size` samples
///
/// Neighbourhoods are clipped at the edges, never padded. Even-sized
/// neighbourhoods take the mean of the two middle values.
pub fn moving_median(data: &[f64], kernel_size: usize) -> Vec<f64> {
    let half = kernel_size / 2;
    let mut scratch = Vec::with_capacity(kernel_size.max(1));

    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(data.len());
            scratch.clear();
            scratch.extend_from_slice(&data[start..end]);
            scratch.sort_by(|a, b| a.total_cmp(b));

            let mid = scratch.len() / 2;
            if scratch.len() % 2 == 1 {
                scratch[mid]
            } else {
                (scratch[mid - 1] + scratch[mid]) / 2.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 256.0;

    fn sine(freq: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    #[test]
    fn test_notch_coefficients() {
        let notch = SosFilter::notch(60.0, 30.0, FS).unwrap();
        let s = notch.sections()[0];

        assert_eq!(notch.name(), "notch");
        assert_eq!(s.b0, s.b2);
        assert_eq!(s.a1, s.b1);
        assert!((s.dc_gain() - 1.0).abs() < 1e-12);
        assert!(notch.magnitude_at(60.0) < 1e-9);
        assert!((notch.magnitude_at(10.0) - 1.0).abs() < 1e-2);
        assert_eq!(notch.padding_len(), 9);
    }

    #[test]
    fn test_notch_rejects_invalid_design() {
        assert!(SosFilter::notch(0.0, 30.0, FS).is_err());
        assert!(SosFilter::notch(128.0, 30.0, FS).is_err());
        assert!(SosFilter::notch(60.0, 0.0, FS).is_err());
    }

    #[test]
    fn test_notch_filtfilt_removes_mains() {
        let notch = SosFilter::notch(60.0, 30.0, FS).unwrap();
        let clean = sine(10.0, 1.0, 512);
        let mains = sine(60.0, 0.5, 512);
        let noisy: Vec<f64> = clean.iter().zip(&mains).map(|(a, b)| a + b).collect();

        let output = notch.filtfilt(&noisy).unwrap();
        assert_eq!(output.len(), noisy.len());

        let worst = (150..362)
            .map(|i| (output[i] - clean[i]).abs())
            .fold(0.0, f64::max);
        assert!(worst < 0.1, "residual {}", worst);
    }

    #[test]
    fn test_filtfilt_keeps_constant_through_notch() {
        let notch = SosFilter::notch(60.0, 30.0, FS).unwrap();
        let output = notch.filtfilt(&vec![42.0; 512]).unwrap();
        assert!(output.iter().all(|v| (v - 42.0).abs() < 1e-9));
    }

    #[test]
    fn test_bandpass_design() {
        let alpha = SosFilter::butterworth_bandpass("alpha", 8, 8.0, 13.0, FS).unwrap();

        assert_eq!(alpha.sections().len(), 8);
        assert_eq!(alpha.padding_len(), 51);
        assert!(alpha.sections().iter().all(|s| s.is_stable()));
        assert!((alpha.magnitude_at(10.2) - 1.0).abs() < 1e-3);
        assert!(alpha.magnitude_at(0.0) < 1e-9);
        assert!(alpha.magnitude_at(4.0) < 1e-3);
        assert!(alpha.magnitude_at(30.0) < 1e-3);
    }

    #[test]
    fn test_bandpass_all_eeg_bands_are_stable() {
        for (name, low, high) in [
            ("delta", 1.0, 4.0),
            ("theta", 4.0, 8.0),
            ("alpha", 8.0, 13.0),
            ("beta", 13.0, 30.0),
            ("gamma", 30.0, 100.0),
        ] {
            let filter = SosFilter::butterworth_bandpass(name, 8, low, high, FS).unwrap();
            let center = (low * high).sqrt();
            assert!(filter.magnitude_at(center) > 0.9, "{} gain at {} Hz", name, center);
        }
    }

    #[test]
    fn test_bandpass_rejects_bad_edges() {
        assert!(SosFilter::butterworth_bandpass("x", 8, 0.0, 4.0, FS).is_err());
        assert!(SosFilter::butterworth_bandpass("x", 8, 13.0, 8.0, FS).is_err());
        assert!(SosFilter::butterworth_bandpass("x", 8, 30.0, 128.0, FS).is_err());
        assert!(SosFilter::butterworth_bandpass("x", 0, 8.0, 13.0, FS).is_err());
    }

    #[test]
    fn test_bandpass_filtfilt_is_zero_phase() {
        let beta = SosFilter::butterworth_bandpass("beta", 8, 13.0, 30.0, FS).unwrap();
        let input = sine(20.0, 1.0, 2048);
        let output = beta.filtfilt(&input).unwrap();

        let worst = (768..1280)
            .map(|i| (output[i] - input[i]).abs())
            .fold(0.0, f64::max);
        assert!(worst < 0.05, "phase/gain error {}", worst);
    }

    #[test]
    fn test_filtfilt_rejects_short_input() {
        let alpha = SosFilter::butterworth_bandpass("alpha", 8, 8.0, 13.0, FS).unwrap();
        let err = alpha.filtfilt(&vec![0.0; 51]).unwrap_err();
        assert_eq!(err, EegError::SignalTooShort { required: 52, actual: 51 });
        assert!(alpha.filtfilt(&vec![0.0; 52]).is_ok());
    }

    #[test]
    fn test_causal_filter_length() {
        let notch = SosFilter::notch(50.0, 30.0, FS).unwrap();
        let output = notch.filter(&sine(10.0, 1.0, 100));
        assert_eq!(output.len(), 100);
    }

    #[test]
    fn test_odd_extension() {
        let extended = odd_extension(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(extended, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn test_moving_median_edges() {
        let data = [5.0, 1.0, 9.0, 3.0, 7.0];
        let smoothed = moving_median(&data, 5);
        // [5,1,9] -> 5 ; [5,1,9,3] -> (3+5)/2 ; full -> 5 ; [1,9,3,7] -> (3+7)/2 ; [9,3,7] -> 7
        assert_eq!(smoothed, vec![5.0, 4.0, 5.0, 5.0, 7.0]);
    }

    #[test]
    fn test_moving_median_removes_spike() {
        let mut data = vec![0.0; 64];
        data[20] = 1000.0;
        assert!(moving_median(&data, 5).iter().all(|&v| v == 0.0));
    }
}
