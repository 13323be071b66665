//! Window-by-window feature pipeline
//!
//! `FeaturePipeline` owns the sample buffer and drives one window at a time
//! through cleaning, the artifact gate, spectral and entropy analysis and the
//! per-band decomposition. Results leave through the [`FeatureSink`] and
//! [`TraceSink`] traits; a sink failure is logged and counted, never
//! propagated.

use crate::band_filter::BandFilterBank;
use crate::buffer::{SampleBuffer, Window};
use crate::config::ProcessingConfig;
use crate::entropy::EntropyExtractor;
use crate::preprocess::Preprocessor;
use crate::spectral::SpectralAnalyzer;
use eeg_core::{BandFeatures, EegError, EegResult, FeatureVector, FrequencyBand, WindowTimestamp};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use tracing::{debug, info, warn};

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Buffer not yet full
    Accumulating,
    /// A window is available for dispatch
    Ready,
    /// One window in flight
    Processing,
    /// Shut down; no further samples accepted
    Stopped,
}

/// What happened to one dispatched window
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// Features computed and accepted by the sink
    Emitted { index: u64, timestamp: WindowTimestamp },
    /// Cleaned window exceeded the amplitude gate
    Artifact { index: u64 },
    /// Feature computation failed or the sink rejected the row
    Failed { index: u64, error: EegError },
}

impl WindowOutcome {
    pub fn index(&self) -> u64 {
        match self {
            WindowOutcome::Emitted { index, .. }
            | WindowOutcome::Artifact { index }
            | WindowOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, WindowOutcome::Emitted { .. })
    }
}

/// Raw and cleaned copies of one processed window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTrace {
    pub timestamp: WindowTimestamp,
    pub window_index: u64,
    pub raw: Vec<f64>,
    pub filtered: Vec<f64>,
}

/// Destination for feature vectors
pub trait FeatureSink: Send {
    fn record(&mut self, features: &FeatureVector) -> EegResult<()>;

    /// Flush and release resources; called once on shutdown
    fn close(&mut self) -> EegResult<()> {
        Ok(())
    }
}

/// Destination for raw/filtered window traces
pub trait TraceSink: Send {
    fn record_trace(&mut self, trace: &WindowTrace) -> EegResult<()>;

    fn close(&mut self) -> EegResult<()> {
        Ok(())
    }
}

impl FeatureSink for mpsc::Sender<FeatureVector> {
    fn record(&mut self, features: &FeatureVector) -> EegResult<()> {
        self.send(features.clone())
            .map_err(|_| EegError::ChannelClosed { channel: "features" })
    }
}

impl TraceSink for mpsc::Sender<WindowTrace> {
    fn record_trace(&mut self, trace: &WindowTrace) -> EegResult<()> {
        self.send(trace.clone())
            .map_err(|_| EegError::ChannelClosed { channel: "traces" })
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FeatureSink for NullSink {
    fn record(&mut self, _features: &FeatureVector) -> EegResult<()> {
        Ok(())
    }
}

impl TraceSink for NullSink {
    fn record_trace(&mut self, _trace: &WindowTrace) -> EegResult<()> {
        Ok(())
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub samples_received: u64,
    pub windows_dispatched: u64,
    pub windows_emitted: u64,
    pub artifacts_skipped: u64,
    pub failures: u64,
    pub sink_failures: u64,
    pub trace_failures: u64,
}

/// Stateless per-window feature computation
#[derive(Debug)]
pub struct FeatureExtractor {
    preprocessor: Preprocessor,
    filter_bank: BandFilterBank,
    analyzer: SpectralAnalyzer,
    entropy: EntropyExtractor,
    bands: Vec<FrequencyBand>,
    label: i32,
}

impl FeatureExtractor {
    /// Validate the configuration and design every filter
    pub fn new(config: &ProcessingConfig) -> EegResult<Self> {
        config.validate()?;

        Ok(FeatureExtractor {
            preprocessor: Preprocessor::new(
                config.median_kernel,
                config.notch_freq,
                config.notch_q,
                config.artifact_threshold,
                config.sampling_rate,
            )?,
            filter_bank: BandFilterBank::new(&config.bands, config.bandpass_order, config.sampling_rate)?,
            analyzer: SpectralAnalyzer::new(
                config.sampling_rate,
                config.psd_segment_len,
                config.psd_segment_overlap,
            )?,
            entropy: EntropyExtractor::new(config.permutation_order, config.permutation_delay),
            bands: config.bands.clone(),
            label: config.label,
        })
    }

    /// Smoothing then notch filtering
    pub fn clean(&self, window: &[f64]) -> EegResult<Vec<f64>> {
        self.preprocessor.clean(window)
    }

    pub fn is_artifact(&self, cleaned: &[f64]) -> bool {
        self.preprocessor.is_artifact(cleaned)
    }

    /// Feature vector for an already cleaned, non-artifact window
    pub fn extract(
        &self,
        cleaned: &[f64],
        timestamp: WindowTimestamp,
        window_index: u64,
    ) -> EegResult<FeatureVector> {
        let spectrum = self.analyzer.estimate_psd(cleaned)?;
        let spectral_entropy = match EntropyExtractor::try_spectral_entropy(&spectrum.psd) {
            Some(entropy) => entropy,
            None => {
                debug!(window = window_index, "degenerate spectrum, spectral entropy set to 0");
                0.0
            }
        };
        let permutation_entropy = self.entropy.permutation_entropy(&self.analyzer.taper(cleaned));

        let mut bands = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            bands.push(self.band_features(cleaned, band)?);
        }

        let vector = FeatureVector {
            timestamp,
            window_index,
            spectral_entropy,
            permutation_entropy,
            power_ratio: power_ratio(&bands),
            bands,
            label: self.label,
        };

        if !vector.is_finite() {
            return Err(EegError::FeatureComputationError {
                timestamp: timestamp.to_string(),
                reason: "non-finite feature value".to_string(),
            });
        }
        Ok(vector)
    }

    fn band_features(&self, cleaned: &[f64], band: &FrequencyBand) -> EegResult<BandFeatures> {
        let isolated = self.filter_bank.isolate_band(cleaned, band)?;
        let slice = self.analyzer.estimate_psd(&isolated)?.band_slice(band);
        let (mean, std) = mean_and_std(&isolated);

        Ok(BandFeatures {
            band: band.name.clone(),
            mean_psd: slice.mean(),
            mean,
            std,
            power: slice.integrated_power(),
            psd: slice.psd,
            freqs: slice.freqs,
        })
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }
}

/// Alpha/beta power ratio
///
/// Alpha falls back to 1 and beta to 0 when absent; a zero beta power gives 0.
pub fn power_ratio(bands: &[BandFeatures]) -> f64 {
    let power_of = |name: &str| {
        bands
            .iter()
            .find(|b| b.is_named(name))
            .map(|b| b.power)
    };
    let alpha = power_of("alpha").unwrap_or(1.0);
    let beta = power_of("beta").unwrap_or(0.0);

    if beta != 0.0 {
        alpha / beta
    } else {
        0.0
    }
}

/// Mean and population standard deviation
fn mean_and_std(signal: &[f64]) -> (f64, f64) {
    if signal.is_empty() {
        return (0.0, 0.0);
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let variance = signal.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Buffering driver that emits one feature vector per clean window
pub struct FeaturePipeline {
    extractor: FeatureExtractor,
    buffer: SampleBuffer,
    feature_sink: Box<dyn FeatureSink>,
    trace_sink: Option<Box<dyn TraceSink>>,
    state: PipelineState,
    stats: PipelineStats,
}

impl FeaturePipeline {
    /// Build a pipeline; every configuration error surfaces here
    pub fn new(config: &ProcessingConfig, feature_sink: Box<dyn FeatureSink>) -> EegResult<Self> {
        let extractor = FeatureExtractor::new(config)?;
        info!(
            sampling_rate = config.sampling_rate,
            window = config.window_size,
            bands = config.bands.len(),
            "feature pipeline ready"
        );

        Ok(FeaturePipeline {
            extractor,
            buffer: SampleBuffer::new(config.window_size, config.retained_samples()),
            feature_sink,
            trace_sink: None,
            state: PipelineState::Accumulating,
            stats: PipelineStats::default(),
        })
    }

    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// Append one sample, processing a window if one completes
    pub fn push_sample(&mut self, sample: f64) -> EegResult<Option<WindowOutcome>> {
        if self.state == PipelineState::Stopped {
            return Err(EegError::PipelineStopped);
        }

        self.buffer.push(sample);
        self.stats.samples_received += 1;

        match self.buffer.take_window() {
            Some(window) => {
                self.state = PipelineState::Ready;
                Ok(Some(self.process_window(window)))
            }
            None => Ok(None),
        }
    }

    /// Push a batch, returning the outcome of every completed window
    pub fn push_samples(&mut self, samples: &[f64]) -> EegResult<Vec<WindowOutcome>> {
        let mut outcomes = Vec::new();
        for &sample in samples {
            if let Some(outcome) = self.push_sample(sample)? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Run one window through the full per-window algorithm
    pub fn process_window(&mut self, window: Window) -> WindowOutcome {
        self.state = PipelineState::Processing;
        self.stats.windows_dispatched += 1;
        let timestamp = WindowTimestamp::now();
        let index = window.index;

        let outcome = match self.extractor.clean(&window.samples) {
            Err(error) => self.fail(index, error),
            Ok(cleaned) if self.extractor.is_artifact(&cleaned) => {
                debug!(window = index, "artifact window skipped");
                self.stats.artifacts_skipped += 1;
                WindowOutcome::Artifact { index }
            }
            Ok(cleaned) => {
                let trace = WindowTrace {
                    timestamp,
                    window_index: index,
                    raw: window.samples,
                    filtered: cleaned,
                };
                self.emit_trace(&trace);

                match self.extractor.extract(&trace.filtered, timestamp, index) {
                    Ok(vector) => match self.emit_features(&vector) {
                        Ok(()) => {
                            self.stats.windows_emitted += 1;
                            WindowOutcome::Emitted { index, timestamp }
                        }
                        Err(error) => WindowOutcome::Failed { index, error },
                    },
                    Err(error) => self.fail(index, error),
                }
            }
        };

        self.state = if self.buffer.is_ready() {
            PipelineState::Ready
        } else {
            PipelineState::Accumulating
        };
        outcome
    }

    fn fail(&mut self, index: u64, error: EegError) -> WindowOutcome {
        warn!(window = index, %error, "window skipped");
        self.stats.failures += 1;
        WindowOutcome::Failed { index, error }
    }

    fn emit_trace(&mut self, trace: &WindowTrace) {
        if let Some(sink) = self.trace_sink.as_mut() {
            if let Err(error) = sink.record_trace(trace) {
                warn!(window = trace.window_index, %error, "trace sink failed");
                self.stats.trace_failures += 1;
            }
        }
    }

    /// Sink errors are counted apart from computation failures
    fn emit_features(&mut self, vector: &FeatureVector) -> EegResult<()> {
        self.feature_sink.record(vector).map_err(|error| {
            warn!(window = vector.window_index, %error, "feature sink failed");
            self.stats.sink_failures += 1;
            error
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Samples currently held in the buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Stop accepting samples, release the buffer and close both sinks
    pub fn shutdown(&mut self) -> PipelineStats {
        if self.state == PipelineState::Stopped {
            return self.stats.clone();
        }
        self.state = PipelineState::Stopped;
        self.buffer.clear();

        if let Err(error) = self.feature_sink.close() {
            warn!(%error, "feature sink close failed");
            self.stats.sink_failures += 1;
        }
        if let Some(sink) = self.trace_sink.as_mut() {
            if let Err(error) = sink.close() {
                warn!(%error, "trace sink close failed");
                self.stats.trace_failures += 1;
            }
        }

        info!(
            windows = self.stats.windows_dispatched,
            emitted = self.stats.windows_emitted,
            artifacts = self.stats.artifacts_skipped,
            "feature pipeline stopped"
        );
        self.stats.clone()
    }

    /// Drop buffered samples and counters; a stopped pipeline stays stopped
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stats = PipelineStats::default();
        if self.state != PipelineState::Stopped {
            self.state = PipelineState::Accumulating;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn pipeline() -> (FeaturePipeline, mpsc::Receiver<FeatureVector>) {
        let (tx, rx) = mpsc::channel();
        let pipeline = FeaturePipeline::new(&ProcessingConfig::default(), Box::new(tx)).unwrap();
        (pipeline, rx)
    }

    fn sine_window(freq: f64, amplitude: f64) -> Vec<f64> {
        (0..512)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / 256.0).sin())
            .collect()
    }

    fn noise_window(seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..512).map(|_| rng.gen_range(-50.0..50.0)).collect()
    }

    fn single_vector(samples: &[f64]) -> FeatureVector {
        let (mut pipeline, rx) = pipeline();
        let outcomes = pipeline.push_samples(samples).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_emitted(), "{:?}", outcomes[0]);
        rx.try_recv().unwrap()
    }

    struct FailingSink;

    impl FeatureSink for FailingSink {
        fn record(&mut self, _features: &FeatureVector) -> EegResult<()> {
            Err(EegError::sink("features", "disk full"))
        }
    }

    #[test]
    fn test_alpha_sine_end_to_end() {
        let vector = single_vector(&sine_window(10.0, 50.0));
        let noise = single_vector(&noise_window(11));

        let alpha = vector.band("alpha").unwrap().power;
        for band in &vector.bands {
            assert!(band.power >= 0.0);
            if band.band != "alpha" {
                assert!(alpha > band.power, "alpha {} vs {} {}", alpha, band.band, band.power);
            }
        }
        assert!(vector.power_ratio > 1.0);
        assert!(vector.permutation_entropy < noise.permutation_entropy);
        assert!(vector.permutation_entropy >= 0.0 && noise.permutation_entropy <= 1.0);
        assert_eq!(vector.label, 0);
    }

    #[test]
    fn test_spike_is_smoothed_before_gate() {
        let mut samples = vec![0.0; 512];
        samples[100] = 1000.0;

        let vector = single_vector(&samples);
        assert_eq!(vector.spectral_entropy, 0.0);
        assert_eq!(vector.permutation_entropy, 0.0);
        assert_eq!(vector.power_ratio, 0.0);
        for band in &vector.bands {
            assert!(band.mean.abs() < 1e-9);
            assert!(band.std.abs() < 1e-9);
            assert_eq!(band.power, 0.0);
        }
    }

    #[test]
    fn test_one_and_a_half_windows_dispatch_twice() {
        let (feature_tx, _feature_rx) = mpsc::channel();
        let (trace_tx, trace_rx) = mpsc::channel();
        let mut pipeline = FeaturePipeline::new(&ProcessingConfig::default(), Box::new(feature_tx))
            .unwrap()
            .with_trace_sink(Box::new(trace_tx));

        let mut samples = sine_window(10.0, 20.0);
        samples.extend(sine_window(6.0, 20.0).into_iter().take(256));
        let outcomes = pipeline.push_samples(&samples).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].index(), 0);
        assert_eq!(outcomes[1].index(), 1);

        let first: WindowTrace = trace_rx.try_recv().unwrap();
        let second: WindowTrace = trace_rx.try_recv().unwrap();
        assert_eq!(first.raw[256..], second.raw[..256]);
        assert_eq!(second.filtered.len(), 512);
        assert_eq!(pipeline.stats().windows_dispatched, 2);
        assert_eq!(pipeline.buffered(), 256);
    }

    #[test]
    fn test_artifact_window_not_emitted_but_buffer_slides() {
        let (mut pipeline, rx) = pipeline();
        let outcomes = pipeline.push_samples(&vec![200.0; 512]).unwrap();

        assert_eq!(outcomes, vec![WindowOutcome::Artifact { index: 0 }]);
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.buffered(), 256);
        assert_eq!(pipeline.stats().artifacts_skipped, 1);
        assert_eq!(pipeline.stats().windows_emitted, 0);
        assert_eq!(pipeline.state(), PipelineState::Accumulating);
    }

    #[test]
    fn test_constant_window_is_spectrally_simple() {
        let constant = single_vector(&vec![20.0; 512]);
        let noise = single_vector(&noise_window(3));
        assert!(constant.spectral_entropy < noise.spectral_entropy);

        let zero = single_vector(&vec![0.0; 512]);
        assert_eq!(zero.permutation_entropy, 0.0);
    }

    #[test]
    fn test_band_order_is_stable_across_windows() {
        let (mut pipeline, rx) = pipeline();
        let mut samples = Vec::new();
        for seed in 0..4 {
            samples.extend(noise_window(seed));
        }
        pipeline.push_samples(&samples).unwrap();

        let vectors: Vec<FeatureVector> = rx.try_iter().collect();
        assert!(vectors.len() >= 3);
        for (i, vector) in vectors.iter().enumerate() {
            assert_eq!(vector.window_index, i as u64);
            assert_eq!(vector.band_names(), vec!["delta", "theta", "alpha", "beta", "gamma"]);
        }
        assert!(vectors.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_sink_failure_is_recovered() {
        let mut pipeline =
            FeaturePipeline::new(&ProcessingConfig::default(), Box::new(FailingSink)).unwrap();
        let outcomes = pipeline.push_samples(&sine_window(10.0, 30.0)).unwrap();

        assert!(matches!(
            &outcomes[0],
            WindowOutcome::Failed { index: 0, error: EegError::SinkError { .. } }
        ));
        assert_eq!(pipeline.stats().sink_failures, 1);
        assert_eq!(pipeline.stats().windows_emitted, 0);
        assert_eq!(pipeline.stats().failures, 0);
        assert!(pipeline.push_sample(1.0).is_ok());
    }

    #[test]
    fn test_shutdown_rejects_samples() {
        let (mut pipeline, _rx) = pipeline();
        pipeline.push_samples(&[1.0; 100]).unwrap();

        let stats = pipeline.shutdown();
        assert_eq!(stats.samples_received, 100);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(pipeline.buffered(), 0);
        assert_eq!(pipeline.push_sample(1.0), Err(EegError::PipelineStopped));

        pipeline.reset();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_reset_clears_buffer_and_counters() {
        let (mut pipeline, _rx) = pipeline();
        pipeline.push_samples(&[1.0; 300]).unwrap();
        pipeline.reset();
        assert_eq!(pipeline.buffered(), 0);
        assert_eq!(pipeline.stats(), &PipelineStats::default());
        assert_eq!(pipeline.state(), PipelineState::Accumulating);
    }

    #[test]
    fn test_non_finite_sample_fails_window() {
        let (mut pipeline, rx) = pipeline();
        let mut samples = sine_window(10.0, 10.0);
        samples[300] = f64::NAN;
        samples[301] = f64::NAN;
        samples[302] = f64::NAN;

        let outcomes = pipeline.push_samples(&samples).unwrap();
        assert!(matches!(outcomes[0], WindowOutcome::Failed { index: 0, .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.stats().failures, 1);
    }

    #[test]
    fn test_invalid_config_rejected_before_samples() {
        let config = ProcessingConfig {
            bands: vec![FrequencyBand::new("gamma", 30.0, 140.0)],
            ..ProcessingConfig::default()
        };
        assert!(FeaturePipeline::new(&config, Box::new(NullSink)).is_err());
    }

    #[test]
    fn test_power_ratio_fallbacks() {
        let band = |name: &str, power: f64| BandFeatures {
            band: name.to_string(),
            psd: vec![],
            mean_psd: 0.0,
            mean: 0.0,
            std: 0.0,
            power,
            freqs: vec![],
        };

        assert_eq!(power_ratio(&[band("alpha", 4.0), band("beta", 2.0)]), 2.0);
        assert_eq!(power_ratio(&[band("alpha", 0.0), band("beta", 0.0)]), 0.0);
        assert_eq!(power_ratio(&[band("theta", 3.0), band("Beta", 4.0)]), 0.25);
        assert_eq!(power_ratio(&[band("alpha", 3.0)]), 0.0);
    }

    #[test]
    fn test_mean_and_std_population() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
        assert_eq!(mean_and_std(&[]), (0.0, 0.0));
    }
}
