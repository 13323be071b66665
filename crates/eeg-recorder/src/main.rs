//! EEG recorder command line
//!
//! # Usage
//!
//! ```bash
//! # Feature extraction from integer samples on stdin, one per line
//! headset-reader | eeg-recorder run --source stdin
//!
//! # Ten seconds of simulated relaxed EEG
//! eeg-recorder run --source simulate --pattern relaxed --seconds 10
//!
//! # Write a starting configuration for 50 Hz mains
//! eeg-recorder print-config --mains 50 > recorder.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eeg_core::FeatureVector;
use eeg_processing::ProcessingConfig;
use eeg_recorder::{start_recorder, IngestHandle, RecorderConfig};
use eeg_simulation::{start_sample_stream, NoiseConfig, SignalPattern, SimulatorConfig, StreamCommand, StreamConfig};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "eeg-recorder")]
#[command(author, version, about = "Real-time EEG emotion feature recorder", long_about = None)]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract features from a live sample source until it ends or Ctrl-C
    Run {
        /// JSON recorder configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Source::Stdin)]
        source: Source,

        /// Simulator preset (flat, alpha, relaxed, focused, drowsy, noise)
        #[arg(short, long, default_value = "relaxed")]
        pattern: String,

        /// Stop the simulator after this many seconds of signal
        #[arg(long)]
        seconds: Option<f64>,

        /// Do not write raw and filtered window traces
        #[arg(long)]
        no_trace: bool,

        /// Simulator seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print a default configuration as JSON
    PrintConfig {
        #[arg(short, long, value_enum, default_value_t = Mains::Hz60)]
        mains: Mains,
    },

    /// Print the feature CSV header for the default bands
    PrintHeader,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    /// Integer samples, one per line
    Stdin,
    /// Built-in paced simulator
    Simulate,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mains {
    #[value(name = "50")]
    Hz50,
    #[value(name = "60")]
    Hz60,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            source,
            pattern,
            seconds,
            no_trace,
            seed,
        } => {
            let mut recorder = match config {
                Some(path) => RecorderConfig::load(&path)
                    .with_context(|| format!("loading configuration from {}", path.display()))?,
                None => RecorderConfig::default(),
            };
            if let Some(dir) = output_dir {
                recorder.output_dir = dir;
            }
            run(recorder, source, &pattern, seconds, !no_trace, seed).await
        }
        Commands::PrintConfig { mains } => {
            let processing = match mains {
                Mains::Hz50 => ProcessingConfig::standard_50hz(),
                Mains::Hz60 => ProcessingConfig::standard_60hz(),
            };
            let config = RecorderConfig { processing, ..RecorderConfig::default() };
            println!("{}", config.to_json()?);
            Ok(())
        }
        Commands::PrintHeader => {
            let bands = ProcessingConfig::default().bands;
            println!("{}", FeatureVector::column_names(&bands).join(","));
            Ok(())
        }
    }
}

async fn run(
    config: RecorderConfig,
    source: Source,
    pattern: &str,
    seconds: Option<f64>,
    record_traces: bool,
    seed: Option<u64>,
) -> Result<()> {
    info!("eeg-recorder v{}", env!("CARGO_PKG_VERSION"));

    let (handle, service) = start_recorder(&config, record_traces).context("starting recorder")?;

    let fed = match source {
        Source::Stdin => {
            let finished = spawn_line_reader(std::io::stdin(), handle.clone())?;
            tokio::select! {
                result = finished => {
                    result.unwrap_or_else(|_| Err(anyhow::anyhow!("stdin reader exited without reporting")))
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    Ok(())
                }
            }
        }
        Source::Simulate => {
            let pattern = SignalPattern::from_name(pattern)
                .with_context(|| format!("unknown pattern '{}'", pattern))?;
            let stream = StreamConfig {
                simulator: SimulatorConfig {
                    sampling_rate: config.processing.sampling_rate,
                    pattern,
                    noise: NoiseConfig {
                        mains_freq: Some(config.processing.notch_freq),
                        ..NoiseConfig::default()
                    },
                    seed,
                },
                duration_limit: seconds,
                ..StreamConfig::default()
            };
            feed_simulator(&handle, stream).await
        }
    };

    handle.shutdown().await.context("stopping recorder")?;
    let stats = service.await.context("recorder task panicked")??;
    fed?;

    info!(
        samples = stats.samples_received,
        dropped = stats.samples_dropped,
        rows = stats.windows_emitted,
        artifacts = stats.artifacts_skipped,
        failures = stats.failures,
        output = %config.feature_path().display(),
        "recording finished"
    );
    Ok(())
}

/// Read samples on a plain thread that reports once input ends
///
/// A blocked terminal read cannot be cancelled, so on Ctrl-C the thread is
/// left behind instead of holding up runtime shutdown.
fn spawn_line_reader<R>(input: R, handle: IngestHandle) -> Result<oneshot::Receiver<Result<()>>>
where
    R: Read + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("sample-reader".to_string())
        .spawn(move || {
            let _ = done_tx.send(feed_lines(BufReader::new(input), &handle));
        })
        .context("spawning sample reader")?;
    Ok(done_rx)
}

/// One sample per line; malformed lines are logged and skipped
fn feed_lines<B: BufRead>(input: B, handle: &IngestHandle) -> Result<()> {
    for (line_number, line) in input.lines().enumerate() {
        let line = line.context("reading samples")?;
        let line_number = line_number + 1;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match text.parse::<f64>() {
            Ok(sample) if sample.is_finite() => handle.push(sample)?,
            _ => warn!(line = line_number, value = text, "skipping malformed sample"),
        }
    }
    Ok(())
}

async fn feed_simulator(handle: &IngestHandle, config: StreamConfig) -> Result<()> {
    let producer = handle.clone();
    let (control, mut stream) = start_sample_stream(config, move |sample| {
        // Only fails once the service has stopped
        let _ = producer.push(sample);
    })?;

    tokio::select! {
        result = &mut stream => {
            result.context("simulator task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            if control.send(StreamCommand::Stop).await.is_err() {
                bail!("simulator stopped unexpectedly");
            }
            stream.await.context("simulator task panicked")??;
        }
    }
    Ok(())
}
