//! Physiological frequency bands

use serde::{Deserialize, Serialize};

/// Named frequency interval used for band isolation and band power
///
/// Spectral slices use the inclusive interval `[low_hz, high_hz]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    /// Create a band
    pub fn new(name: &str, low_hz: f64, high_hz: f64) -> Self {
        FrequencyBand {
            name: name.to_string(),
            low_hz,
            high_hz,
        }
    }

    /// The five EEG rhythms in their fixed feature order
    ///
    /// Names are lower case, so feature columns read `delta_psd` and so on.
    /// Recordings made with capitalised band names (`Delta_psd`) keep their
    /// own header; appending to such a file mixes the two schemas.
    pub fn eeg_bands() -> Vec<FrequencyBand> {
        vec![
            FrequencyBand::new("delta", 1.0, 4.0),
            FrequencyBand::new("theta", 4.0, 8.0),
            FrequencyBand::new("alpha", 8.0, 13.0),
            FrequencyBand::new("beta", 13.0, 30.0),
            FrequencyBand::new("gamma", 30.0, 100.0),
        ]
    }

    /// Whether a spectral bin falls inside the band (edges included)
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }

    /// Check the band lies strictly inside `(0, nyquist)`
    pub fn check_edges(&self, nyquist: f64) -> Result<(), String> {
        if !(self.low_hz.is_finite() && self.high_hz.is_finite()) {
            return Err(format!("band '{}' has non-finite edges", self.name));
        }
        if self.low_hz <= 0.0 {
            return Err(format!("band '{}' low edge {} Hz must be positive", self.name, self.low_hz));
        }
        if self.high_hz >= nyquist {
            return Err(format!(
                "band '{}' high edge {} Hz must be below nyquist {} Hz",
                self.name, self.high_hz, nyquist
            ));
        }
        if self.low_hz >= self.high_hz {
            return Err(format!(
                "band '{}' low edge {} Hz must be below high edge {} Hz",
                self.name, self.low_hz, self.high_hz
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eeg_band_order() {
        let names: Vec<String> = FrequencyBand::eeg_bands().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["delta", "theta", "alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let alpha = FrequencyBand::new("alpha", 8.0, 13.0);
        assert!(alpha.contains(8.0));
        assert!(alpha.contains(13.0));
        assert!(!alpha.contains(13.5));
        assert!(!alpha.contains(7.9));
    }

    #[test]
    fn test_check_edges() {
        let nyquist = 128.0;
        for band in FrequencyBand::eeg_bands() {
            assert!(band.check_edges(nyquist).is_ok());
        }
        assert!(FrequencyBand::new("dc", 0.0, 4.0).check_edges(nyquist).is_err());
        assert!(FrequencyBand::new("high", 30.0, 128.0).check_edges(nyquist).is_err());
        assert!(FrequencyBand::new("flipped", 13.0, 8.0).check_edges(nyquist).is_err());
    }
}
