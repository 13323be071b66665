//! Error handling for the EEG feature pipeline
//!
//! Only configuration-time errors are fatal. Everything raised while a window
//! is in flight is reported, counted and skipped by the pipeline.

use core::fmt;

/// Result type alias for pipeline operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type for all pipeline operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EegError {
    /// Invalid startup configuration
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// A filter could not be designed or is unstable
    FilterDesignError {
        /// Filter that failed (band name or "notch")
        filter: String,
        /// Why the design was rejected
        reason: String,
    },

    /// Signal shorter than an operation requires
    SignalTooShort {
        /// Minimum length required
        required: usize,
        /// Length actually provided
        actual: usize,
    },

    /// Feature computation produced an unusable value for one window
    FeatureComputationError {
        /// Completion timestamp of the affected window
        timestamp: String,
        /// What went wrong
        reason: String,
    },

    /// A feature or trace sink rejected a record
    SinkError {
        /// Sink identifier
        sink: String,
        /// Failure description
        message: String,
    },

    /// The pipeline has been shut down and accepts no more samples
    PipelineStopped,

    /// An internal channel closed unexpectedly
    ChannelClosed {
        /// Channel name
        channel: &'static str,
    },
}

impl EegError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        EegError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Shorthand for a sink error
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        EegError::SinkError {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// True for errors that must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EegError::ConfigurationError { .. } | EegError::FilterDesignError { .. }
        )
    }
}

impl fmt::Display for EegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EegError::ConfigurationError { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            EegError::FilterDesignError { filter, reason } => {
                write!(f, "Filter design failed for {}: {}", filter, reason)
            }
            EegError::SignalTooShort { required, actual } => {
                write!(f, "Signal too short: required {} samples, got {}",
                       required, actual)
            }
            EegError::FeatureComputationError { timestamp, reason } => {
                write!(f, "Feature computation failed for window at {}: {}",
                       timestamp, reason)
            }
            EegError::SinkError { sink, message } => {
                write!(f, "Sink '{}' failed: {}", sink, message)
            }
            EegError::PipelineStopped => {
                write!(f, "Pipeline stopped: no further samples are accepted")
            }
            EegError::ChannelClosed { channel } => {
                write!(f, "Channel '{}' closed", channel)
            }
        }
    }
}

impl std::error::Error for EegError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::EegError::ConfigurationError {
            message: format!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EegError::SignalTooShort {
            required: 52,
            actual: 10,
        };
        let display = format!("{}", error);
        assert!(display.contains("too short"));
        assert!(display.contains("52"));
        assert!(display.contains("10"));
    }

    #[test]
    fn test_config_error_macro() {
        let error = config_error!("band '{}' exceeds nyquist", "gamma");
        assert_eq!(error, EegError::config("band 'gamma' exceeds nyquist"));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_per_window_errors_are_not_fatal() {
        let error = EegError::FeatureComputationError {
            timestamp: "2024-01-01 00:00:00.000000".to_string(),
            reason: "non-finite power".to_string(),
        };
        assert!(!error.is_fatal());
        assert!(!EegError::sink("features", "queue full").is_fatal());
        assert!(format!("{}", error).contains("2024-01-01"));
    }
}
