//! EEG-Recorder: Live ingestion and persistence for the feature pipeline
//!
//! Samples enter through a bounded queue, a single dispatch task drives the
//! `FeaturePipeline`, and feature rows and window traces are appended to CSV
//! files by blocking writer workers.

pub mod config;
pub mod service;
pub mod sinks;

pub use config::RecorderConfig;
pub use service::{start_recorder, IngestCommand, IngestHandle, IngestStats, IngestionService};
pub use sinks::{spawn_queued_sink, CsvFeatureWriter, CsvTraceWriter, QueuedSink, RecordWriter, SinkReport, SinkWorker};
