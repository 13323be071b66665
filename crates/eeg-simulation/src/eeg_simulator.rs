//! Single-channel EEG simulator with noise and interference

use crate::signal_patterns::SignalPattern;
use eeg_core::{config_error, EegResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Disturbances added on top of the pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f64,
    /// Mains interference frequency, if any
    pub mains_freq: Option<f64>,
    pub mains_amplitude: f64,
    /// Per-sample probability of an impulsive spike
    pub spike_probability: f64,
    pub spike_amplitude: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 3.0,
            mains_freq: Some(60.0),
            mains_amplitude: 5.0,
            spike_probability: 0.0,
            spike_amplitude: 400.0,
        }
    }
}

impl NoiseConfig {
    /// No disturbances at all
    pub fn clean() -> Self {
        Self {
            gaussian_std: 0.0,
            mains_freq: None,
            mains_amplitude: 0.0,
            spike_probability: 0.0,
            spike_amplitude: 0.0,
        }
    }
}

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    pub pattern: SignalPattern,
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 256.0,
            pattern: SignalPattern::Rhythms {
                delta: 10.0,
                theta: 8.0,
                alpha: 35.0,
                beta: 6.0,
                gamma: 2.0,
            },
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate.is_finite()) {
            return Err(config_error!("simulator sampling rate must be positive"));
        }
        if !(self.noise.gaussian_std >= 0.0 && self.noise.gaussian_std.is_finite()) {
            return Err(config_error!(
                "gaussian noise std must be finite and non-negative, got {}",
                self.noise.gaussian_std
            ));
        }
        if !(0.0..=1.0).contains(&self.noise.spike_probability) {
            return Err(config_error!(
                "spike probability must be in [0, 1], got {}",
                self.noise.spike_probability
            ));
        }
        if let Some(freq) = self.noise.mains_freq {
            if !(freq > 0.0) {
                return Err(config_error!("mains frequency must be positive, got {}", freq));
            }
        }
        Ok(())
    }
}

/// Deterministic integer-valued sample source
///
/// Samples are rounded to whole device units, like a headset ADC.
pub struct EegSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    normal_dist: Normal<f64>,
    sample_index: u64,
}

impl EegSimulator {
    pub fn new(config: SimulatorConfig) -> EegResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std)
            .map_err(|e| config_error!("Failed to create normal distribution: {}", e))?;

        Ok(EegSimulator {
            config,
            rng,
            normal_dist,
            sample_index: 0,
        })
    }

    /// Next sample in device units
    pub fn next_sample(&mut self) -> f64 {
        let time = self.sample_index as f64 / self.config.sampling_rate;
        self.sample_index += 1;

        let mut value = self.config.pattern.value_at(time, &mut self.rng);

        if self.config.noise.gaussian_std > 0.0 {
            value += self.normal_dist.sample(&mut self.rng);
        }

        if let Some(freq) = self.config.noise.mains_freq {
            value += self.config.noise.mains_amplitude * (2.0 * PI * freq * time).sin();
        }

        // Impulsive artifacts
        if self.config.noise.spike_probability > 0.0
            && self.rng.gen::<f64>() < self.config.noise.spike_probability
        {
            let sign = if self.rng.gen::<bool>() { 1.0 } else { -1.0 };
            value += sign * self.config.noise.spike_amplitude;
        }

        value.round()
    }

    /// Generate `count` consecutive samples
    pub fn generate(&mut self, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Generate samples covering `seconds` of signal
    pub fn generate_duration(&mut self, seconds: f64) -> Vec<f64> {
        let count = (seconds * self.config.sampling_rate).round().max(0.0) as usize;
        self.generate(count)
    }

    /// Seconds of signal produced so far
    pub fn elapsed(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate
    }

    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
    }

    pub fn set_pattern(&mut self, pattern: SignalPattern) {
        self.config.pattern = pattern;
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(pattern: SignalPattern, noise: NoiseConfig) -> EegSimulator {
        EegSimulator::new(SimulatorConfig {
            sampling_rate: 256.0,
            pattern,
            noise,
            seed: Some(42),
        })
        .unwrap()
    }

    #[test]
    fn test_samples_are_integers() {
        let mut simulator = seeded(SignalPattern::from_name("relaxed").unwrap(), NoiseConfig::default());
        let samples = simulator.generate(512);
        assert_eq!(samples.len(), 512);
        assert!(samples.iter().all(|v| v.fract() == 0.0));
        assert_eq!(simulator.samples_generated(), 512);
        assert!((simulator.elapsed() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_samples() {
        let noise = NoiseConfig { spike_probability: 0.05, ..NoiseConfig::default() };
        let pattern = SignalPattern::UniformNoise { amplitude: 30.0 };
        let a = seeded(pattern, noise.clone()).generate(300);
        let b = seeded(pattern, noise).generate(300);
        assert_eq!(a, b);
    }

    #[test]
    fn test_clean_constant() {
        let mut simulator = seeded(SignalPattern::Constant { level: 12.4 }, NoiseConfig::clean());
        assert!(simulator.generate_duration(1.0).iter().all(|&v| v == 12.0));
    }

    #[test]
    fn test_spikes_exceed_eeg_range() {
        let noise = NoiseConfig {
            spike_probability: 1.0,
            spike_amplitude: 400.0,
            ..NoiseConfig::clean()
        };
        let mut simulator = seeded(SignalPattern::Constant { level: 0.0 }, noise);
        assert!(simulator.generate(50).iter().all(|v| v.abs() == 400.0));
    }

    #[test]
    fn test_reset_time_restarts_waveform() {
        let mut simulator = seeded(
            SignalPattern::Sinusoid { frequency: 10.0, amplitude: 50.0 },
            NoiseConfig::clean(),
        );
        let first = simulator.generate(64);
        simulator.reset_time();
        assert_eq!(simulator.generate(64), first);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = SimulatorConfig::default();
        config.noise.spike_probability = 1.5;
        assert!(EegSimulator::new(config).is_err());

        let mut config = SimulatorConfig::default();
        config.noise.gaussian_std = -1.0;
        assert!(EegSimulator::new(config).is_err());

        let mut config = SimulatorConfig::default();
        config.noise.gaussian_std = f64::NAN;
        assert!(config.validate().is_err());

        let config = SimulatorConfig { sampling_rate: 0.0, ..SimulatorConfig::default() };
        assert!(EegSimulator::new(config).is_err());
    }

    #[test]
    fn test_config_json() {
        let config = SimulatorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"rhythms\""));
        let parsed: SimulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
