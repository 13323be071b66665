//! CSV persistence behind bounded queues
//!
//! The pipeline never touches the file system. Each sink is a [`QueuedSink`]
//! that hands records to a blocking writer worker with `try_send`; a full
//! queue is reported as a sink error and the record is lost.

use eeg_core::{EegError, EegResult, FeatureVector, FrequencyBand};
use eeg_processing::{FeatureSink, TraceSink, WindowTrace};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Header of the trace file
pub const TRACE_HEADER: [&str; 4] = ["timestamp", "type", "index", "value"];

/// Synchronous record writer run on a blocking worker
pub trait RecordWriter<T>: Send + 'static {
    fn write_record(&mut self, record: &T) -> EegResult<()>;

    fn flush(&mut self) -> EegResult<()>;
}

/// Quote a field when it contains a delimiter, quote or line break
pub fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_row<W: Write, S: AsRef<str>>(writer: &mut W, fields: &[S]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{}", line)
}

/// Open `path` for appending, writing `header` only if the file is new or empty
fn open_append(path: &Path, header: &[String], sink: &str) -> EegResult<BufWriter<File>> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EegError::sink(sink, format!("cannot open {}: {}", path.display(), e)))?;

    let mut writer = BufWriter::new(file);
    if is_new {
        write_row(&mut writer, header)
            .and_then(|_| writer.flush())
            .map_err(|e| EegError::sink(sink, e.to_string()))?;
        debug!(path = %path.display(), "wrote CSV header");
    }
    Ok(writer)
}

/// Appends one row per feature vector
pub struct CsvFeatureWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    columns: usize,
}

impl CsvFeatureWriter {
    pub fn open(path: &Path, bands: &[FrequencyBand]) -> EegResult<Self> {
        let header = FeatureVector::column_names(bands);
        Ok(CsvFeatureWriter {
            path: path.to_path_buf(),
            writer: open_append(path, &header, "features")?,
            columns: header.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordWriter<FeatureVector> for CsvFeatureWriter {
    fn write_record(&mut self, record: &FeatureVector) -> EegResult<()> {
        let row = record.to_record();
        if row.len() != self.columns {
            return Err(EegError::sink(
                "features",
                format!("row has {} columns, header has {}", row.len(), self.columns),
            ));
        }
        write_row(&mut self.writer, &row)
            .and_then(|_| self.writer.flush())
            .map_err(|e| EegError::sink("features", e.to_string()))
    }

    fn flush(&mut self) -> EegResult<()> {
        self.writer.flush().map_err(|e| EegError::sink("features", e.to_string()))
    }
}

/// Appends raw and filtered samples of every processed window
pub struct CsvTraceWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvTraceWriter {
    pub fn open(path: &Path) -> EegResult<Self> {
        let header: Vec<String> = TRACE_HEADER.iter().map(|s| s.to_string()).collect();
        Ok(CsvTraceWriter {
            path: path.to_path_buf(),
            writer: open_append(path, &header, "traces")?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_series(&mut self, timestamp: &str, kind: &str, values: &[f64]) -> std::io::Result<()> {
        for (index, value) in values.iter().enumerate() {
            let index = index.to_string();
            let value = value.to_string();
            write_row(&mut self.writer, &[timestamp, kind, index.as_str(), value.as_str()])?;
        }
        Ok(())
    }
}

impl RecordWriter<WindowTrace> for CsvTraceWriter {
    fn write_record(&mut self, record: &WindowTrace) -> EegResult<()> {
        let timestamp = record.timestamp.to_string();
        self.write_series(&timestamp, "raw", &record.raw)
            .and_then(|_| self.write_series(&timestamp, "filtered", &record.filtered))
            .and_then(|_| self.writer.flush())
            .map_err(|e| EegError::sink("traces", e.to_string()))
    }

    fn flush(&mut self) -> EegResult<()> {
        self.writer.flush().map_err(|e| EegError::sink("traces", e.to_string()))
    }
}

/// Outcome of a writer worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub written: u64,
    pub failed: u64,
}

/// Non-blocking front end of a writer worker
pub struct QueuedSink<T> {
    name: &'static str,
    sender: Option<mpsc::Sender<T>>,
}

impl<T> QueuedSink<T> {
    fn enqueue(&self, record: T) -> EegResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| EegError::sink(self.name, "sink already closed"))?;

        sender.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => EegError::sink(self.name, "writer queue full, record dropped"),
            TrySendError::Closed(_) => EegError::ChannelClosed { channel: self.name },
        })
    }

    fn shut(&mut self) {
        // Dropping the sender lets the worker drain and exit
        self.sender.take();
    }
}

impl FeatureSink for QueuedSink<FeatureVector> {
    fn record(&mut self, features: &FeatureVector) -> EegResult<()> {
        self.enqueue(features.clone())
    }

    fn close(&mut self) -> EegResult<()> {
        self.shut();
        Ok(())
    }
}

impl TraceSink for QueuedSink<WindowTrace> {
    fn record_trace(&mut self, trace: &WindowTrace) -> EegResult<()> {
        self.enqueue(trace.clone())
    }

    fn close(&mut self) -> EegResult<()> {
        self.shut();
        Ok(())
    }
}

/// Handle on a running writer worker
pub struct SinkWorker {
    name: &'static str,
    handle: JoinHandle<SinkReport>,
}

impl SinkWorker {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the worker to drain its queue and flush
    pub async fn finish(self) -> EegResult<SinkReport> {
        self.handle
            .await
            .map_err(|e| EegError::sink(self.name, format!("writer worker failed: {}", e)))
    }
}

/// Start a blocking writer worker fed by a bounded queue
///
/// Must be called from within a tokio runtime.
pub fn spawn_queued_sink<T, W>(name: &'static str, mut writer: W, capacity: usize) -> (QueuedSink<T>, SinkWorker)
where
    T: Send + 'static,
    W: RecordWriter<T>,
{
    let (sender, mut receiver) = mpsc::channel::<T>(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        let mut report = SinkReport::default();
        while let Some(record) = receiver.blocking_recv() {
            match writer.write_record(&record) {
                Ok(()) => report.written += 1,
                Err(error) => {
                    warn!(sink = name, %error, "record write failed");
                    report.failed += 1;
                }
            }
        }
        if let Err(error) = writer.flush() {
            warn!(sink = name, %error, "final flush failed");
        }
        report
    });

    (
        QueuedSink {
            name,
            sender: Some(sender),
        },
        SinkWorker { name, handle },
    )
}
