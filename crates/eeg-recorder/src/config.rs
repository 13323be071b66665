//! Recorder configuration

use eeg_core::{config_error, EegResult};
use eeg_processing::ProcessingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the recorder needs at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub processing: ProcessingConfig,
    /// Directory that receives the CSV files
    pub output_dir: PathBuf,
    pub feature_file: String,
    /// Trace CSV file name; `None` disables traces
    pub trace_file: Option<String>,
    /// Samples that may wait for dispatch before new ones are dropped
    pub sample_queue_capacity: usize,
    /// Records that may wait for each writer worker
    pub sink_queue_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            output_dir: PathBuf::from("recordings"),
            feature_file: "features.csv".to_string(),
            trace_file: Some("traces.csv".to_string()),
            sample_queue_capacity: 4096,
            sink_queue_capacity: 64,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> EegResult<()> {
        self.processing.validate()?;

        if self.feature_file.trim().is_empty() {
            return Err(config_error!("feature file name must not be empty"));
        }
        if let Some(trace) = &self.trace_file {
            if trace.trim().is_empty() {
                return Err(config_error!("trace file name must not be empty"));
            }
            if trace == &self.feature_file {
                return Err(config_error!("trace and feature files must differ"));
            }
        }
        if self.sample_queue_capacity == 0 || self.sink_queue_capacity == 0 {
            return Err(config_error!("queue capacities must be greater than 0"));
        }
        Ok(())
    }

    pub fn feature_path(&self) -> PathBuf {
        self.output_dir.join(&self.feature_file)
    }

    pub fn trace_path(&self) -> Option<PathBuf> {
        self.trace_file.as_ref().map(|name| self.output_dir.join(name))
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> EegResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("Failed to read {}: {}", path.display(), e))?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Export configuration as JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))
    }
}
