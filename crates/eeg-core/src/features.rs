//! Per-window feature schema
//!
//! A `FeatureVector` is built once per non-artifact window and handed to the
//! feature sink. Its column layout is fixed by the band table so tabular
//! output never drifts between rows.

use crate::band::FrequencyBand;
use crate::timestamp::WindowTimestamp;
use serde::{Deserialize, Serialize};

/// Suffixes of the six columns written for every band, in order
pub const BAND_COLUMN_SUFFIXES: [&str; 6] = ["psd", "meanpsd", "mean", "std", "power", "freqs"];

/// Features derived from one band-isolated copy of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandFeatures {
    /// Band name, copied from the band table
    pub band: String,
    /// PSD values whose bins fall inside the band
    pub psd: Vec<f64>,
    /// Mean of `psd` (0 when the slice is empty)
    pub mean_psd: f64,
    /// Time-domain mean of the band-limited signal
    pub mean: f64,
    /// Time-domain population standard deviation of the band-limited signal
    pub std: f64,
    /// Trapezoidal integral of `psd` over `freqs`
    pub power: f64,
    /// Bin frequencies matching `psd`
    pub freqs: Vec<f64>,
}

impl BandFeatures {
    /// Case-insensitive band name match
    pub fn is_named(&self, name: &str) -> bool {
        self.band.eq_ignore_ascii_case(name)
    }
}

/// Complete feature row for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub timestamp: WindowTimestamp,
    /// Dispatch index of the source window (not part of the tabular schema)
    pub window_index: u64,
    pub spectral_entropy: f64,
    pub permutation_entropy: f64,
    /// One entry per configured band, in band-table order
    pub bands: Vec<BandFeatures>,
    pub power_ratio: f64,
    pub label: i32,
}

impl FeatureVector {
    /// Column names for the given band table
    pub fn column_names(bands: &[FrequencyBand]) -> Vec<String> {
        let mut header = vec![
            "timestamp".to_string(),
            "spectral_entropy".to_string(),
            "permutation_entropy".to_string(),
        ];
        for band in bands {
            for suffix in BAND_COLUMN_SUFFIXES {
                header.push(format!("{}_{}", band.name, suffix));
            }
        }
        header.push("power_ratio".to_string());
        header.push("label".to_string());
        header
    }

    /// Cell values in `column_names` order
    ///
    /// Sequence-valued cells are rendered as JSON arrays.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(5 + self.bands.len() * BAND_COLUMN_SUFFIXES.len());
        record.push(self.timestamp.to_string());
        record.push(self.spectral_entropy.to_string());
        record.push(self.permutation_entropy.to_string());
        for band in &self.bands {
            record.push(float_list(&band.psd));
            record.push(band.mean_psd.to_string());
            record.push(band.mean.to_string());
            record.push(band.std.to_string());
            record.push(band.power.to_string());
            record.push(float_list(&band.freqs));
        }
        record.push(self.power_ratio.to_string());
        record.push(self.label.to_string());
        record
    }

    /// Band names in the order they appear in this vector
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.band.as_str()).collect()
    }

    /// Look up a band by case-insensitive name
    pub fn band(&self, name: &str) -> Option<&BandFeatures> {
        self.bands.iter().find(|b| b.is_named(name))
    }

    /// Whether every scalar and sequence value is finite
    pub fn is_finite(&self) -> bool {
        self.spectral_entropy.is_finite()
            && self.permutation_entropy.is_finite()
            && self.power_ratio.is_finite()
            && self.bands.iter().all(|b| {
                b.mean_psd.is_finite()
                    && b.mean.is_finite()
                    && b.std.is_finite()
                    && b.power.is_finite()
                    && b.psd.iter().all(|v| v.is_finite())
            })
    }
}

fn float_list(values: &[f64]) -> String {
    // serde_json only fails on non-finite floats, which it writes as null anyway
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vector() -> FeatureVector {
        let bands = FrequencyBand::eeg_bands()
            .into_iter()
            .map(|b| BandFeatures {
                band: b.name.clone(),
                psd: vec![1.0, 2.0],
                mean_psd: 1.5,
                mean: 0.0,
                std: 1.0,
                power: 1.5,
                freqs: vec![b.low_hz, b.low_hz + 1.0],
            })
            .collect();

        FeatureVector {
            timestamp: WindowTimestamp::now(),
            window_index: 0,
            spectral_entropy: 2.5,
            permutation_entropy: 0.75,
            bands,
            power_ratio: 1.0,
            label: 0,
        }
    }

    #[test]
    fn test_column_names_layout() {
        let header = FeatureVector::column_names(&FrequencyBand::eeg_bands());
        assert_eq!(header.len(), 3 + 5 * 6 + 2);
        assert_eq!(header[0], "timestamp");
        assert_eq!(header[3], "delta_psd");
        assert_eq!(header[8], "delta_freqs");
        assert_eq!(header[9], "theta_psd");
        assert_eq!(header[header.len() - 2], "power_ratio");
        assert_eq!(header[header.len() - 1], "label");
    }

    #[test]
    fn test_record_matches_header_width() {
        let vector = sample_vector();
        let header = FeatureVector::column_names(&FrequencyBand::eeg_bands());
        let record = vector.to_record();
        assert_eq!(record.len(), header.len());
        assert_eq!(record[3], "[1.0,2.0]");
        assert_eq!(record[record.len() - 1], "0");
    }

    #[test]
    fn test_band_lookup_and_finiteness() {
        let mut vector = sample_vector();
        assert_eq!(vector.band_names(), vec!["delta", "theta", "alpha", "beta", "gamma"]);
        assert!(vector.band("ALPHA").is_some());
        assert!(vector.band("mu").is_none());
        assert!(vector.bands[2].is_named("Alpha"));
        assert!(!vector.bands[2].is_named("beta"));
        assert!(vector.is_finite());

        vector.bands[2].power = f64::NAN;
        assert!(!vector.is_finite());
    }
}
