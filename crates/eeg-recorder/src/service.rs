//! Ingestion service for real-time feature extraction
//!
//! Samples are pushed through a bounded queue without blocking the caller.
//! One task owns the `FeaturePipeline` and dispatches windows in arrival
//! order, so feature rows can never be reordered.

use crate::config::RecorderConfig;
use crate::sinks::{spawn_queued_sink, CsvFeatureWriter, CsvTraceWriter, SinkWorker};
use eeg_core::{EegError, EegResult, FeatureVector};
use eeg_processing::{FeaturePipeline, PipelineStats, WindowOutcome, WindowTrace};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands for controlling ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestCommand {
    /// Stop dispatching; samples keep queueing until the queue is full
    Pause,
    Resume,
    /// Drain queued samples, stop the pipeline and flush the sinks
    Shutdown,
}

/// Statistics about ingestion and processing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub is_paused: bool,
    pub samples_received: u64,
    pub samples_dropped: u64,
    pub windows_dispatched: u64,
    pub windows_emitted: u64,
    pub artifacts_skipped: u64,
    pub failures: u64,
    pub sink_failures: u64,
    pub trace_failures: u64,
}

impl IngestStats {
    fn absorb(&mut self, pipeline: &PipelineStats) {
        self.samples_received = pipeline.samples_received;
        self.windows_dispatched = pipeline.windows_dispatched;
        self.windows_emitted = pipeline.windows_emitted;
        self.artifacts_skipped = pipeline.artifacts_skipped;
        self.failures = pipeline.failures;
        self.sink_failures = pipeline.sink_failures;
        self.trace_failures = pipeline.trace_failures;
    }
}

/// Cloneable front end used by sample producers
#[derive(Clone)]
pub struct IngestHandle {
    samples: mpsc::Sender<f64>,
    commands: mpsc::Sender<IngestCommand>,
    stats: Arc<Mutex<IngestStats>>,
    dropped: Arc<AtomicU64>,
}

impl IngestHandle {
    /// Queue one sample without blocking
    ///
    /// A full queue drops the sample and counts it; only a stopped service
    /// is an error.
    pub fn push(&self, sample: f64) -> EegResult<()> {
        match self.samples.try_send(sample) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!(dropped, "sample queue full, dropping samples");
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(EegError::PipelineStopped),
        }
    }

    pub async fn pause(&self) -> EegResult<()> {
        self.send(IngestCommand::Pause).await
    }

    pub async fn resume(&self) -> EegResult<()> {
        self.send(IngestCommand::Resume).await
    }

    pub async fn shutdown(&self) -> EegResult<()> {
        self.send(IngestCommand::Shutdown).await
    }

    async fn send(&self, command: IngestCommand) -> EegResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EegError::ChannelClosed { channel: "ingest commands" })
    }

    /// Samples dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Get current ingestion statistics
    pub async fn stats(&self) -> IngestStats {
        let mut stats = self.stats.lock().await.clone();
        stats.samples_dropped = self.dropped();
        stats
    }
}

/// Owns the pipeline and dispatches queued samples
pub struct IngestionService {
    pipeline: FeaturePipeline,
    sample_receiver: mpsc::Receiver<f64>,
    command_receiver: mpsc::Receiver<IngestCommand>,
    stats: Arc<Mutex<IngestStats>>,
    dropped: Arc<AtomicU64>,
    workers: Vec<SinkWorker>,
    paused: bool,
}

impl IngestionService {
    /// Create the service and the handle that feeds it
    pub fn new(pipeline: FeaturePipeline, queue_capacity: usize) -> (Self, IngestHandle) {
        let (sample_sender, sample_receiver) = mpsc::channel(queue_capacity.max(1));
        let (command_sender, command_receiver) = mpsc::channel(32);
        let stats = Arc::new(Mutex::new(IngestStats::default()));
        let dropped = Arc::new(AtomicU64::new(0));

        let handle = IngestHandle {
            samples: sample_sender,
            commands: command_sender,
            stats: Arc::clone(&stats),
            dropped: Arc::clone(&dropped),
        };

        let service = IngestionService {
            pipeline,
            sample_receiver,
            command_receiver,
            stats,
            dropped,
            workers: Vec::new(),
            paused: false,
        };
        (service, handle)
    }

    /// Writer workers to await on shutdown
    pub fn with_workers(mut self, workers: Vec<SinkWorker>) -> Self {
        self.workers = workers;
        self
    }

    /// Main dispatch loop
    pub async fn run(mut self) -> EegResult<IngestStats> {
        info!("ingestion service started");

        loop {
            tokio::select! {
                biased;

                command = self.command_receiver.recv() => {
                    match command {
                        Some(IngestCommand::Pause) => {
                            self.paused = true;
                            self.stats.lock().await.is_paused = true;
                            info!("ingestion paused");
                        }
                        Some(IngestCommand::Resume) => {
                            self.paused = false;
                            self.stats.lock().await.is_paused = false;
                            info!("ingestion resumed");
                        }
                        Some(IngestCommand::Shutdown) | None => break,
                    }
                }

                sample = self.sample_receiver.recv(), if !self.paused => {
                    match sample {
                        Some(sample) => {
                            if !self.dispatch(sample).await {
                                break;
                            }
                        }
                        None => {
                            debug!("all sample producers gone");
                            break;
                        }
                    }
                }
            }
        }

        self.finish().await
    }

    /// Feed one sample; false once the pipeline refuses samples
    async fn dispatch(&mut self, sample: f64) -> bool {
        match self.pipeline.push_sample(sample) {
            Ok(outcome) => {
                if let Some(WindowOutcome::Emitted { index, .. }) = &outcome {
                    debug!(window = index, "feature row emitted");
                }
                self.stats.lock().await.absorb(self.pipeline.stats());
                true
            }
            Err(error) => {
                warn!(%error, "pipeline refused sample");
                false
            }
        }
    }

    async fn finish(mut self) -> EegResult<IngestStats> {
        // Samples already accepted are still processed
        self.sample_receiver.close();
        let mut drained = 0u64;
        while let Ok(sample) = self.sample_receiver.try_recv() {
            if !self.dispatch(sample).await {
                break;
            }
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "processed queued samples before shutdown");
        }

        let pipeline_stats = self.pipeline.shutdown();

        for worker in self.workers.drain(..) {
            let name = worker.name();
            match worker.finish().await {
                Ok(report) => info!(sink = name, written = report.written, failed = report.failed, "sink flushed"),
                Err(error) => warn!(sink = name, %error, "sink worker did not finish cleanly"),
            }
        }

        let mut stats = self.stats.lock().await;
        stats.absorb(&pipeline_stats);
        stats.samples_dropped = self.dropped.load(Ordering::Relaxed);
        stats.is_paused = false;

        info!(
            samples = stats.samples_received,
            dropped = stats.samples_dropped,
            emitted = stats.windows_emitted,
            artifacts = stats.artifacts_skipped,
            "ingestion service stopped"
        );
        Ok(stats.clone())
    }
}

/// Build the CSV sinks and pipeline, then start the service in the background
///
/// Configuration and file errors surface here, before any sample is accepted.
/// Must be called from within a tokio runtime.
pub fn start_recorder(
    config: &RecorderConfig,
    record_traces: bool,
) -> EegResult<(IngestHandle, JoinHandle<EegResult<IngestStats>>)> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        EegError::sink(
            "features",
            format!("cannot create {}: {}", config.output_dir.display(), e),
        )
    })?;

    let mut workers = Vec::new();

    let feature_writer = CsvFeatureWriter::open(&config.feature_path(), &config.processing.bands)?;
    let (feature_sink, feature_worker) =
        spawn_queued_sink::<FeatureVector, _>("features", feature_writer, config.sink_queue_capacity);
    workers.push(feature_worker);

    let mut pipeline = FeaturePipeline::new(&config.processing, Box::new(feature_sink))?;

    if let Some(trace_path) = config.trace_path().filter(|_| record_traces) {
        let trace_writer = CsvTraceWriter::open(&trace_path)?;
        let (trace_sink, trace_worker) =
            spawn_queued_sink::<WindowTrace, _>("traces", trace_writer, config.sink_queue_capacity);
        workers.push(trace_worker);
        pipeline = pipeline.with_trace_sink(Box::new(trace_sink));
    }

    info!(
        features = %config.feature_path().display(),
        traces = record_traces && config.trace_file.is_some(),
        "recorder configured"
    );

    let (service, handle) = IngestionService::new(pipeline, config.sample_queue_capacity);
    let service = service.with_workers(workers);
    let task = tokio::spawn(service.run());

    Ok((handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_processing::{NullSink, ProcessingConfig};
    use std::f64::consts::PI;
    use std::path::PathBuf;
    use tokio::time::{sleep, Duration};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("eeg-recorder-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn alpha_sample(i: usize) -> f64 {
        (40.0 * (2.0 * PI * 10.0 * i as f64 / 256.0).sin()).round()
    }

    #[tokio::test]
    async fn test_recorder_writes_rows_and_traces() {
        let config = RecorderConfig {
            output_dir: temp_dir("rows"),
            ..RecorderConfig::default()
        };
        let (handle, task) = start_recorder(&config, true).unwrap();

        for i in 0..1024 {
            handle.push(alpha_sample(i)).unwrap();
        }
        handle.shutdown().await.unwrap();
        let stats = task.await.unwrap().unwrap();

        assert_eq!(stats.samples_received, 1024);
        assert_eq!(stats.samples_dropped, 0);
        assert_eq!(stats.windows_dispatched, 3);
        assert_eq!(stats.windows_emitted, 3);

        let features = std::fs::read_to_string(config.feature_path()).unwrap();
        assert_eq!(features.lines().count(), 4);

        let traces = std::fs::read_to_string(config.trace_path().unwrap()).unwrap();
        assert_eq!(traces.lines().count(), 1 + 3 * 2 * 512);
        assert!(handle.push(1.0).is_err());
    }

    #[tokio::test]
    async fn test_recorder_without_traces() {
        let config = RecorderConfig {
            output_dir: temp_dir("notrace"),
            ..RecorderConfig::default()
        };
        let (handle, task) = start_recorder(&config, false).unwrap();
        for i in 0..512 {
            handle.push(alpha_sample(i)).unwrap();
        }
        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();

        assert!(config.feature_path().exists());
        assert!(!config.trace_path().unwrap().exists());
    }

    #[tokio::test]
    async fn test_artifacts_are_counted_not_written() {
        let config = RecorderConfig {
            output_dir: temp_dir("artifact"),
            trace_file: None,
            ..RecorderConfig::default()
        };
        let (handle, task) = start_recorder(&config, true).unwrap();
        for _ in 0..512 {
            handle.push(300.0).unwrap();
        }
        handle.shutdown().await.unwrap();
        let stats = task.await.unwrap().unwrap();

        assert_eq!(stats.artifacts_skipped, 1);
        assert_eq!(stats.windows_emitted, 0);
        let features = std::fs::read_to_string(config.feature_path()).unwrap();
        assert_eq!(features.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_samples() {
        let pipeline = FeaturePipeline::new(&ProcessingConfig::default(), Box::new(NullSink)).unwrap();
        let (service, handle) = IngestionService::new(pipeline, 8);

        // Service not running yet, so the queue fills up
        for i in 0..20 {
            handle.push(i as f64).unwrap();
        }
        assert_eq!(handle.dropped(), 12);

        let task = tokio::spawn(service.run());
        handle.shutdown().await.unwrap();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.samples_received, 8);
        assert_eq!(stats.samples_dropped, 12);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let pipeline = FeaturePipeline::new(&ProcessingConfig::default(), Box::new(NullSink)).unwrap();
        let (service, handle) = IngestionService::new(pipeline, 2048);
        let task = tokio::spawn(service.run());

        handle.pause().await.unwrap();
        sleep(Duration::from_millis(20)).await;
        assert!(handle.stats().await.is_paused);

        for i in 0..600 {
            handle.push(alpha_sample(i)).unwrap();
        }
        sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.stats().await.windows_dispatched, 0);

        handle.resume().await.unwrap();
        sleep(Duration::from_millis(200)).await;
        let stats = handle.stats().await;
        assert!(!stats.is_paused);
        assert_eq!(stats.windows_dispatched, 1);

        handle.shutdown().await.unwrap();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.samples_received, 600);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_start() {
        let mut config = RecorderConfig {
            output_dir: temp_dir("invalid"),
            ..RecorderConfig::default()
        };
        config.processing.notch_freq = 500.0;
        assert!(start_recorder(&config, true).is_err());
    }
}
