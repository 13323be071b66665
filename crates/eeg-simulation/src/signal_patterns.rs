//! Pre-defined EEG signal patterns

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Centre frequencies used for the rhythm mix (Hz)
pub const RHYTHM_FREQUENCIES: [f64; 5] = [2.0, 6.0, 10.0, 20.0, 40.0];

/// Underlying waveform before noise and interference are added
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPattern {
    /// Flat signal
    Constant { level: f64 },
    /// Single tone
    Sinusoid { frequency: f64, amplitude: f64 },
    /// Sum of tones at the delta..gamma centre frequencies
    Rhythms {
        delta: f64,
        theta: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    },
    /// Independent uniform samples in `[-amplitude, amplitude)`
    UniformNoise { amplitude: f64 },
}

impl SignalPattern {
    /// Pattern value at `time` seconds
    pub fn value_at<R: Rng + ?Sized>(&self, time: f64, rng: &mut R) -> f64 {
        match self {
            SignalPattern::Constant { level } => *level,

            SignalPattern::Sinusoid { frequency, amplitude } => {
                amplitude * (2.0 * PI * frequency * time).sin()
            }

            SignalPattern::Rhythms { .. } => self
                .rhythm_amplitudes()
                .iter()
                .zip(RHYTHM_FREQUENCIES)
                .map(|(amplitude, freq)| amplitude * (2.0 * PI * freq * time).sin())
                .sum(),

            SignalPattern::UniformNoise { amplitude } => {
                if *amplitude > 0.0 {
                    rng.gen_range(-amplitude..*amplitude)
                } else {
                    0.0
                }
            }
        }
    }

    fn rhythm_amplitudes(&self) -> [f64; 5] {
        match self {
            SignalPattern::Rhythms { delta, theta, alpha, beta, gamma } => {
                [*delta, *theta, *alpha, *beta, *gamma]
            }
            _ => [0.0; 5],
        }
    }

    /// Largest absolute value the pattern can take
    pub fn peak_amplitude(&self) -> f64 {
        match self {
            SignalPattern::Constant { level } => level.abs(),
            SignalPattern::Sinusoid { amplitude, .. } => amplitude.abs(),
            SignalPattern::Rhythms { .. } => self.rhythm_amplitudes().iter().map(|a| a.abs()).sum(),
            SignalPattern::UniformNoise { amplitude } => amplitude.abs(),
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            SignalPattern::Constant { .. } => "Flat signal",
            SignalPattern::Sinusoid { .. } => "Single tone",
            SignalPattern::Rhythms { .. } => "Mixed EEG rhythms",
            SignalPattern::UniformNoise { .. } => "Uniform noise",
        }
    }

    /// Named presets selectable from the command line
    pub fn presets() -> Vec<(&'static str, SignalPattern)> {
        vec![
            ("flat", SignalPattern::Constant { level: 0.0 }),
            ("alpha", SignalPattern::Sinusoid { frequency: 10.0, amplitude: 50.0 }),
            ("relaxed", SignalPattern::Rhythms {
                delta: 10.0, theta: 8.0, alpha: 35.0, beta: 6.0, gamma: 2.0
            }),
            ("focused", SignalPattern::Rhythms {
                delta: 8.0, theta: 6.0, alpha: 8.0, beta: 30.0, gamma: 6.0
            }),
            ("drowsy", SignalPattern::Rhythms {
                delta: 25.0, theta: 30.0, alpha: 10.0, beta: 4.0, gamma: 1.0
            }),
            ("noise", SignalPattern::UniformNoise { amplitude: 50.0 }),
        ]
    }

    /// Look up a preset by case-insensitive name
    pub fn from_name(name: &str) -> Option<SignalPattern> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, pattern)| pattern)
    }
}
