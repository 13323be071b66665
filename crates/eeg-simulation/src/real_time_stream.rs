//! Real-time sample streaming paced at the sampling rate

use crate::eeg_simulator::{EegSimulator, SimulatorConfig};
use crate::signal_patterns::SignalPattern;
use eeg_core::{config_error, EegResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub simulator: SimulatorConfig,
    /// Seconds of signal delivered per timer tick
    pub chunk_duration: f64,
    /// Stop on its own after this many seconds of signal
    pub duration_limit: Option<f64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            chunk_duration: 0.1,
            duration_limit: None,
        }
    }
}

impl StreamConfig {
    /// Samples delivered per tick, at least one
    pub fn chunk_samples(&self) -> usize {
        ((self.chunk_duration * self.simulator.sampling_rate).round() as usize).max(1)
    }

    /// Total samples before the stream stops itself
    pub fn sample_limit(&self) -> Option<u64> {
        self.duration_limit
            .map(|secs| (secs * self.simulator.sampling_rate).round().max(0.0) as u64)
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Pause,
    Resume,
    Stop,
    UpdatePattern(SignalPattern),
}

/// Stream statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    pub samples_generated: u64,
}

/// Paced simulator delivering one sample per callback invocation
pub struct RealTimeSampleStream {
    config: StreamConfig,
    simulator: EegSimulator,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    stats: Arc<Mutex<StreamStats>>,
}

impl RealTimeSampleStream {
    pub fn new(config: StreamConfig) -> EegResult<Self> {
        if !(config.chunk_duration > 0.0 && config.chunk_duration.is_finite()) {
            return Err(config_error!("chunk duration must be positive, got {}", config.chunk_duration));
        }
        let simulator = EegSimulator::new(config.simulator.clone())?;
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(RealTimeSampleStream {
            config,
            simulator,
            control_receiver,
            control_sender,
            stats: Arc::new(Mutex::new(StreamStats::default())),
        })
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    /// Stream until stopped or the duration limit is reached
    pub async fn run<F>(&mut self, mut on_sample: F) -> EegResult<()>
    where
        F: FnMut(f64) + Send,
    {
        let mut timer = interval(Duration::from_secs_f64(self.config.chunk_duration));
        let chunk = self.config.chunk_samples();
        let limit = self.config.sample_limit();
        let mut paused = false;

        self.stats.lock().await.is_running = true;
        info!(
            sampling_rate = self.config.simulator.sampling_rate,
            chunk,
            "sample stream started"
        );

        loop {
            tokio::select! {
                _ = timer.tick(), if !paused => {
                    let produced = self.simulator.samples_generated();
                    let count = match limit {
                        Some(limit) => chunk.min(limit.saturating_sub(produced) as usize),
                        None => chunk,
                    };

                    for _ in 0..count {
                        on_sample(self.simulator.next_sample());
                    }

                    {
                        let mut stats = self.stats.lock().await;
                        stats.chunks_generated += 1;
                        stats.samples_generated += count as u64;
                    }

                    if limit.is_some_and(|limit| self.simulator.samples_generated() >= limit) {
                        debug!("sample stream reached its duration limit");
                        break;
                    }
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Pause) => {
                            paused = true;
                            self.stats.lock().await.is_running = false;
                            debug!("sample stream paused");
                        }
                        Some(StreamCommand::Resume) => {
                            paused = false;
                            timer.reset();
                            self.stats.lock().await.is_running = true;
                            debug!("sample stream resumed");
                        }
                        Some(StreamCommand::UpdatePattern(pattern)) => {
                            info!(pattern = pattern.description(), "sample stream pattern updated");
                            self.simulator.set_pattern(pattern);
                        }
                        Some(StreamCommand::Stop) | None => break,
                    }
                }
            }
        }

        self.stats.lock().await.is_running = false;
        info!(samples = self.simulator.samples_generated(), "sample stream stopped");
        Ok(())
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

/// Helper function to create and start a stream in the background
pub fn start_sample_stream<F>(
    config: StreamConfig,
    on_sample: F,
) -> EegResult<(mpsc::Sender<StreamCommand>, JoinHandle<EegResult<()>>)>
where
    F: FnMut(f64) + Send + 'static,
{
    let mut stream = RealTimeSampleStream::new(config)?;
    let control_sender = stream.control_handle();

    let handle = tokio::spawn(async move { stream.run(on_sample).await });

    Ok((control_sender, handle))
}
